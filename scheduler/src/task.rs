//! The retryable task abstraction and the boot-time registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use scrip_store::TaskRecord;
use scrip_types::Timestamp;

use crate::SchedulerError;

/// Failure of a single task execution attempt. The scheduler only needs the
/// message; the retry decision is driven by the task's `max_retries`.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A unit of retryable work.
///
/// `subject` encodes the entity id the task re-drives (`id`, or `id|hop` for
/// per-hop tasks) and is what gets persisted — a task must be fully
/// reconstructible from `(name, subject)` alone.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    fn subject(&self) -> String;

    /// Retries after which the task is marked terminally failed.
    fn max_retries(&self) -> u32;

    /// Deadline for execution attempt number `retry` (0-based) of a task
    /// created at `created`.
    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp;

    /// Execute one attempt. Must be idempotent against concurrent retries of
    /// the same task.
    async fn execute(&self) -> Result<(), TaskError>;
}

type TaskCtor = Box<dyn Fn(&str) -> Result<Arc<dyn Task>, SchedulerError> + Send + Sync>;

/// Maps task names to constructors, used to rehydrate persisted task rows on
/// boot. Built explicitly at startup so several mint instances can carry
/// independent registries in one process.
#[derive(Default)]
pub struct TaskRegistry {
    ctors: HashMap<&'static str, TaskCtor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &'static str, ctor: F)
    where
        F: Fn(&str) -> Result<Arc<dyn Task>, SchedulerError> + Send + Sync + 'static,
    {
        self.ctors.insert(name, Box::new(ctor));
    }

    /// Resolve a persisted record back to a concrete task.
    pub fn resolve(&self, record: &TaskRecord) -> Result<Arc<dyn Task>, SchedulerError> {
        let ctor = self
            .ctors
            .get(record.name.as_str())
            .ok_or_else(|| SchedulerError::UnknownTask(record.name.clone()))?;
        ctor(&record.subject)
    }
}

/// Split an `id|hop` subject into its parts.
pub fn split_subject(subject: &str) -> Option<(&str, u8)> {
    let (id, hop) = subject.rsplit_once('|')?;
    hop.parse().ok().map(|hop| (id, hop))
}

/// Join an id and hop into an `id|hop` subject.
pub fn join_subject(id: &str, hop: u8) -> String {
    format!("{id}|{hop}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_roundtrip() {
        let joined = join_subject("alice@mint-a.example[transaction_0a]", 3);
        let (id, hop) = split_subject(&joined).unwrap();
        assert_eq!(id, "alice@mint-a.example[transaction_0a]");
        assert_eq!(hop, 3);
    }

    #[test]
    fn split_subject_rejects_plain_ids() {
        assert!(split_subject("alice@mint-a.example[transaction_0a]").is_none());
    }
}
