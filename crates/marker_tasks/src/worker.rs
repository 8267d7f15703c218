use std::sync::Arc;

use marker_settings::WorkerSettings;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::manager::TaskManager;

/// Background workers that poll the task store for pending work.
///
/// Each worker claims at most one task per poll and dispatches it under a
/// shared semaphore of `max_concurrent` permits, so a pool never runs more
/// than that many evals at once. Exceptions in one task never affect
/// siblings.
pub struct TaskWorkerPool {
    pub workers: Vec<JoinHandle<()>>,
}

impl TaskWorkerPool {
    pub fn start_workers(
        manager: Arc<TaskManager>,
        settings: &WorkerSettings,
        shutdown_rx: watch::Receiver<()>,
    ) -> Self {
        info!("Starting {} task workers", settings.worker_count);
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        let poll_interval = settings
            .poll_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(1));

        let workers = (0..settings.worker_count)
            .map(|id| {
                tokio::spawn(Self::run_worker(
                    id,
                    manager.clone(),
                    semaphore.clone(),
                    poll_interval,
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Self { workers }
    }

    #[instrument(skip_all, fields(worker_id = id))]
    async fn run_worker(
        id: usize,
        manager: Arc<TaskManager>,
        semaphore: Arc<Semaphore>,
        poll_interval: std::time::Duration,
        mut shutdown: watch::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Task worker {id}: shutting down");
                    break;
                }
                result = Self::poll_once(&manager, &semaphore, poll_interval) => {
                    if let Err(e) = result {
                        error!("Task worker {id}: poll error: {e}");
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        }
    }

    /// One poll cycle: take a permit, try to claim a task, dispatch it.
    /// Sleeps when nothing is pending.
    async fn poll_once(
        manager: &Arc<TaskManager>,
        semaphore: &Arc<Semaphore>,
        poll_interval: std::time::Duration,
    ) -> Result<(), crate::error::TaskError> {
        // Semaphore is never closed while workers run.
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            return Ok(());
        };

        let Some(task) = manager.claim_pending().await? else {
            drop(permit);
            tokio::time::sleep(poll_interval).await;
            return Ok(());
        };

        debug!("Claimed task {}", task.id);
        let manager = manager.clone();
        tokio::spawn(async move {
            let task_id = task.id.clone();
            if let Err(e) = manager.execute_claimed(task).await {
                error!("Task {task_id} execution failed: {e}");
            }
            drop(permit);
        });

        Ok(())
    }
}
