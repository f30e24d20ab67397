//! Repository of bake tasks.
//!
//! Each task owns a [`ProgressBus`]. The registry spawns one worker per
//! submission, pumps its output through [`classify_line`] into the bus, and
//! closes the bus with an `exit` event when the worker is gone. Finished
//! tasks stay attachable until evicted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use hourglass_core::options::BakeOptions;
use hourglass_core::protocol::{classify_line, ProgressEvent};
use hourglass_core::types::{new_task_id, TaskId, Timestamp};
use tokio::sync::RwLock;

use crate::bus::{ProgressBus, SubscriberId, Subscription};
use crate::error::RegistryError;
use crate::launcher::{OutputReceiver, WorkerLauncher, WorkerOutput};

/// Flag that puts the worker into line-protocol mode.
pub const PROGRESS_FLAG: &str = "--progress";

struct TaskEntry {
    bus: ProgressBus,
    created_at: Timestamp,
    finished_at: Option<Timestamp>,
}

impl TaskEntry {
    fn new() -> Self {
        Self {
            bus: ProgressBus::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Read-only view of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub id: TaskId,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub events: usize,
    pub subscribers: usize,
}

/// Thread-safe task repository, shared as `Arc<TaskRegistry>`.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
    launcher: Arc<dyn WorkerLauncher>,
}

impl TaskRegistry {
    pub fn new(launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            launcher,
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Validate `options`, start a worker for them and begin recording its
    /// output under a fresh task id.
    pub async fn submit(self: &Arc<Self>, options: BakeOptions) -> Result<TaskId, RegistryError> {
        options.validate()?;

        let mut args = vec![PROGRESS_FLAG.to_string()];
        args.extend(options.to_args());

        let output = self.launcher.launch(args)?;
        let task_id = new_task_id();
        self.tasks
            .write()
            .await
            .insert(task_id.clone(), TaskEntry::new());

        tracing::info!(
            task_id = %task_id,
            duration = options.duration,
            neck = options.neck,
            grains = options.grains,
            "Bake submitted"
        );

        tokio::spawn(Arc::clone(self).pump(task_id.clone(), output));
        Ok(task_id)
    }

    /// Forward worker output into the task until the worker exits.
    async fn pump(self: Arc<Self>, task_id: TaskId, mut output: OutputReceiver) {
        let mut code = None;
        while let Some(item) = output.recv().await {
            match item {
                WorkerOutput::Line(line) => {
                    if let Some(event) = classify_line(&line) {
                        if let Err(e) = self.record_event(&task_id, event).await {
                            tracing::debug!(task_id = %task_id, error = %e, "Dropping worker output");
                        }
                    }
                }
                WorkerOutput::Exited(exit) => {
                    code = exit;
                    break;
                }
            }
        }
        if let Err(e) = self.complete(&task_id, code).await {
            tracing::debug!(task_id = %task_id, error = %e, "Task gone before exit");
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Append `event` to the task log and push it to live subscribers.
    pub async fn record_event(
        &self,
        task_id: &str,
        event: ProgressEvent,
    ) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        entry.bus.publish(event);
        Ok(())
    }

    /// Record the terminal `exit` event and end every live subscription.
    ///
    /// Completing an already finished task is a no-op.
    pub async fn complete(&self, task_id: &str, code: Option<i32>) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        if entry.bus.is_closed() {
            return Ok(());
        }
        entry.bus.publish(ProgressEvent::Exit { code });
        entry.bus.close();
        entry.finished_at = Some(Utc::now());

        match code {
            Some(0) => tracing::info!(task_id = %task_id, "Bake finished"),
            _ => tracing::warn!(task_id = %task_id, code = ?code, "Bake worker failed"),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subscribers
    // -----------------------------------------------------------------------

    /// Subscribe to a task: the full log first, then live events.
    pub async fn attach(&self, task_id: &str) -> Result<Subscription, RegistryError> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
        let subscription = entry.bus.subscribe();
        tracing::debug!(task_id = %task_id, subscriber = subscription.id, "Subscriber attached");
        Ok(subscription)
    }

    /// Remove a subscriber. Unknown tasks and subscribers are ignored.
    pub async fn detach(&self, task_id: &str, subscriber: SubscriberId) {
        if let Some(entry) = self.tasks.write().await.get_mut(task_id) {
            entry.bus.unsubscribe(subscriber);
            tracing::debug!(task_id = %task_id, subscriber, "Subscriber detached");
        }
    }

    pub async fn subscriber_count(&self, task_id: &str) -> Result<usize, RegistryError> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|entry| entry.bus.live_subscribers())
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Inspection and retention
    // -----------------------------------------------------------------------

    pub async fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.read().await.keys().cloned().collect()
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn summary(&self, task_id: &str) -> Result<TaskSummary, RegistryError> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|entry| TaskSummary {
                id: task_id.to_string(),
                created_at: entry.created_at,
                finished_at: entry.finished_at,
                events: entry.bus.log().len(),
                subscribers: entry.bus.live_subscribers(),
            })
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))
    }

    /// Drop finished tasks whose exit is older than `cutoff`.
    ///
    /// Running tasks are never evicted. Returns how many were dropped.
    pub async fn evict_finished_before(&self, cutoff: Timestamp) -> usize {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, entry| !matches!(entry.finished_at, Some(at) if at < cutoff));
        before - tasks.len()
    }
}
