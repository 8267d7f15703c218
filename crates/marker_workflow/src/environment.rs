use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time and identity primitives for workflows.
///
/// Workflows must be deterministic under replay, so they never touch the
/// wall clock or process-local randomness directly; everything goes through
/// the environment. The runtime environment delegates to tokio/uuid, test
/// environments are virtual.
#[async_trait]
pub trait WorkflowEnvironment: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn new_id(&self) -> String;

    async fn sleep(&self, duration: Duration);
}

/// Production environment backed by the process clock and UUIDv7.
#[derive(Debug, Default)]
pub struct RuntimeEnvironment;

#[async_trait]
impl WorkflowEnvironment for RuntimeEnvironment {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn new_id(&self) -> String {
        marker_types::create_uuid7()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
