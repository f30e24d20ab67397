//! Periodic eviction of finished bake tasks.
//!
//! A task stays attachable (its full log replayable) until it has been
//! terminal for longer than the retention period. Running tasks are never
//! evicted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hourglass_events::TaskRegistry;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Evict tasks that finished more than `retention` ago. Returns the count.
pub async fn sweep(registry: &TaskRegistry, retention: Duration) -> usize {
    let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    registry.evict_finished_before(cutoff).await
}

/// Run the retention loop until `cancel` is triggered.
pub async fn run(registry: Arc<TaskRegistry>, retention: Duration, cancel: CancellationToken) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Task retention job started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Task retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = sweep(&registry, retention).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Task retention: evicted finished tasks");
                } else {
                    tracing::debug!("Task retention: nothing to evict");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourglass_core::options::BakeOptions;
    use hourglass_events::launcher::OutputReceiver;
    use hourglass_events::{RegistryError, WorkerLauncher, WorkerOutput};

    /// Every worker exits immediately with success.
    struct InstantExit;

    impl WorkerLauncher for InstantExit {
        fn launch(&self, _args: Vec<String>) -> Result<OutputReceiver, RegistryError> {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            tx.send(WorkerOutput::Exited(Some(0))).ok();
            Ok(rx)
        }
    }

    async fn finished_task(registry: &Arc<TaskRegistry>) -> String {
        let id = registry.submit(BakeOptions::default()).await.unwrap();
        for _ in 0..200 {
            if registry.summary(&id).await.unwrap().finished_at.is_some() {
                return id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task never finished");
    }

    #[tokio::test]
    async fn sweep_keeps_recent_tasks() {
        let registry = Arc::new(TaskRegistry::new(Arc::new(InstantExit)));
        finished_task(&registry).await;

        assert_eq!(sweep(&registry, Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.task_count().await, 1);
    }

    #[tokio::test]
    async fn sweep_evicts_expired_tasks() {
        let registry = Arc::new(TaskRegistry::new(Arc::new(InstantExit)));
        finished_task(&registry).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(sweep(&registry, Duration::ZERO).await, 1);
        assert_eq!(registry.task_count().await, 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let registry = Arc::new(TaskRegistry::new(Arc::new(InstantExit)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(registry, Duration::from_secs(60), cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("retention loop should stop")
            .unwrap();
    }
}
