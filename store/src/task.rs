//! Retry task storage trait.

use scrip_types::{TaskStatus, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A persisted unit of retryable work.
///
/// `subject` encodes the entity id the task must re-drive, with `|hop`
/// appended for per-hop tasks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task token (`task_<hex>`), unique per mint.
    pub id: String,
    pub name: String,
    pub subject: String,
    pub status: TaskStatus,
    pub retry: u32,
    pub created: Timestamp,
}

/// Trait for task storage operations.
pub trait TaskStore {
    fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, StoreError>;
    /// All tasks still awaiting execution, for boot-time rehydration.
    fn list_pending_tasks(&self) -> Result<Vec<TaskRecord>, StoreError>;
    fn put_task(&mut self, record: &TaskRecord) -> Result<(), StoreError>;
}
