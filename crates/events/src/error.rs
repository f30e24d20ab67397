use hourglass_core::error::CoreError;
use hourglass_core::types::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
