//! Asynchronous retry scheduler.
//!
//! Whenever a propagation call to a remote mint fails after local state has
//! committed, the work is captured as a persisted [`TaskRecord`] plus an
//! in-memory [`Task`] and retried on a deadline schedule. On boot, pending
//! task rows are rehydrated through a name→constructor [`TaskRegistry`] so a
//! restart never loses work.

pub mod queue;
pub mod task;
pub mod worker;

pub use queue::Scheduler;
pub use task::{join_subject, split_subject, Task, TaskError, TaskRegistry};
pub use worker::spawn;

use scrip_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown task name: {0}")]
    UnknownTask(String),

    #[error("invalid task subject {subject:?} for {name}")]
    InvalidSubject { name: String, subject: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
