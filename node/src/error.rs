//! Node error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Store(#[from] scrip_store::StoreError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] scrip_scheduler::SchedulerError),

    #[error("server error: {0}")]
    Server(String),
}
