/// Identifier of a server-tracked bake task.
///
/// Kept as a plain string so that arbitrary path segments can be looked up
/// (and rejected as not found) without a parse step.
pub type TaskId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, time-ordered task id.
pub fn new_task_id() -> TaskId {
    uuid::Uuid::now_v7().to_string()
}
