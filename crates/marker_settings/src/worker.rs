use chrono::Duration;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSettings {
    /// Number of background workers polling for pending tasks.
    pub worker_count: usize,
    /// Tasks one worker processes concurrently.
    pub max_concurrent: usize,
    /// Sleep between polls when no pending tasks are available.
    pub poll_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        let worker_count = std::env::var("MARKER_WORKER_COUNT")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<usize>()
            .unwrap_or(1);

        let max_concurrent = std::env::var("MARKER_WORKER_MAX_CONCURRENT")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<usize>()
            .unwrap_or(3);

        let poll_interval = std::env::var("MARKER_WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<i64>()
            .map(Duration::milliseconds)
            .unwrap_or_else(|_| Duration::milliseconds(1000));

        Self {
            worker_count,
            max_concurrent,
            poll_interval,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineSettings {
    /// Default per-run concurrency cap. Lower bound 1.
    pub concurrency_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let concurrency_limit = std::env::var("MARKER_CONCURRENCY_LIMIT")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .unwrap_or(5)
            .max(1);

        Self { concurrency_limit }
    }
}
