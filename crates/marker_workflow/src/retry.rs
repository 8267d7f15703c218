use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::environment::WorkflowEnvironment;
use crate::error::WorkflowError;

/// Retry policy of one workflow activity.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub max_interval: Duration,
    pub overall_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn load_dataset() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(60),
            overall_timeout: None,
        }
    }

    pub fn run_eval() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(5),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(300),
            overall_timeout: Some(Duration::from_secs(2 * 60 * 60)),
        }
    }

    pub fn emit_results() -> Self {
        Self {
            max_attempts: 2,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(60),
            overall_timeout: None,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_coefficient.powi(attempt as i32);
        let interval = self.initial_interval.mul_f64(factor);
        interval.min(self.max_interval)
    }
}

/// Outcome of a retried activity, with the attempt count for replay audit.
#[derive(Debug)]
pub struct ActivityOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run an activity under a retry policy. Sleeps go through the workflow
/// environment so virtual time works in replay.
pub async fn run_activity<T, E, F, Fut>(
    env: &Arc<dyn WorkflowEnvironment>,
    activity: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<ActivityOutcome<T>, WorkflowError>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = env.now();
    let mut attempts = 0;

    loop {
        if let Some(overall) = policy.overall_timeout {
            let elapsed = (env.now() - started).to_std().unwrap_or_default();
            if elapsed >= overall {
                return Err(WorkflowError::TimedOut {
                    activity: activity.to_string(),
                });
            }
        }

        attempts += 1;
        debug!("Running activity '{activity}' (attempt {attempts})");

        match operation().await {
            Ok(value) => return Ok(ActivityOutcome { value, attempts }),
            Err(cause) if attempts >= policy.max_attempts => {
                return Err(WorkflowError::ActivityFailed {
                    activity: activity.to_string(),
                    attempts,
                    cause: cause.to_string(),
                });
            }
            Err(cause) => {
                let backoff = policy.backoff(attempts - 1);
                warn!(
                    "Activity '{activity}' attempt {attempts} failed ({cause}); retrying in {backoff:?}"
                );
                env.sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::testing::VirtualEnvironment;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn env() -> Arc<dyn WorkflowEnvironment> {
        Arc::new(VirtualEnvironment::new())
    }

    #[tokio::test]
    async fn test_succeeds_after_retries() {
        let env = env();
        let failures = AtomicU32::new(2);

        let outcome = run_activity(&env, "run_eval", &RetryPolicy::run_eval(), || {
            let remaining = failures.load(Ordering::SeqCst);
            async move {
                if remaining > 0 {
                    failures.fetch_sub(1, Ordering::SeqCst);
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail() {
        let env = env();
        let err = run_activity(&env, "load_dataset", &RetryPolicy::load_dataset(), || async {
            Err::<(), _>("file missing".to_string())
        })
        .await
        .unwrap_err();

        match err {
            WorkflowError::ActivityFailed {
                activity, attempts, ..
            } => {
                assert_eq!(activity, "load_dataset");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::run_eval();
        assert_eq!(policy.backoff(0), Duration::from_secs(5));
        assert_eq!(policy.backoff(1), Duration::from_secs(10));
        assert_eq!(policy.backoff(2), Duration::from_secs(20));
        assert_eq!(policy.backoff(10), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_virtual_time_advances_through_sleeps() {
        let virtual_env = Arc::new(VirtualEnvironment::new());
        let env: Arc<dyn WorkflowEnvironment> = virtual_env.clone();
        let failures = AtomicU32::new(1);

        run_activity(&env, "run_eval", &RetryPolicy::run_eval(), || {
            let remaining = failures.load(Ordering::SeqCst);
            async move {
                if remaining > 0 {
                    failures.fetch_sub(1, Ordering::SeqCst);
                    Err("transient".to_string())
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(virtual_env.elapsed_ms(), 5_000);
    }
}
