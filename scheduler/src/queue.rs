//! Deadline-ordered pending queue and retry bookkeeping.
//!
//! Pending tasks live in a binary heap keyed by their next deadline; a
//! single-slot hand-off channel feeds the worker loops. `schedule` is cheap
//! and safe to call from anywhere: it peeks the nearest deadline and pushes
//! the task into the channel only when due, deferring to the next tick when
//! the channel is already occupied.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use scrip_crypto::new_token;
use scrip_store::{MintStore, StoreTxn, TaskRecord, TaskStore};
use scrip_types::{id::prefix, TaskStatus, Timestamp};

use crate::task::{Task, TaskRegistry};
use crate::SchedulerError;

/// A pending task paired with its persisted record and next deadline.
pub(crate) struct Scheduled {
    pub deadline: Timestamp,
    pub record: TaskRecord,
    pub task: Arc<dyn Task>,
}

impl Eq for Scheduled {}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.record.id == other.record.id
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier deadline = higher priority. On tie, stable order by id.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.record.id.cmp(&self.record.id))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The mint's retry scheduler.
///
/// One instance per mint; constructed at startup and shared by reference, so
/// several mints can run side by side in one process.
pub struct Scheduler {
    store: Arc<dyn MintStore>,
    pending: Mutex<BinaryHeap<Scheduled>>,
    /// Single-slot hand-off to the worker loops.
    tx: mpsc::Sender<Scheduled>,
    pub(crate) rx: AsyncMutex<mpsc::Receiver<Scheduled>>,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MintStore>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(1);
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            store,
            pending: Mutex::new(BinaryHeap::new()),
            tx,
            rx: AsyncMutex::new(rx),
            shutdown,
        })
    }

    /// Persist a new task and schedule it immediately.
    pub fn queue(&self, task: Arc<dyn Task>) -> Result<(), SchedulerError> {
        let record = TaskRecord {
            id: new_token(prefix::TASK),
            name: task.name().to_string(),
            subject: task.subject(),
            status: TaskStatus::Pending,
            retry: 0,
            created: Timestamp::now(),
        };
        let mut txn = self.store.begin()?;
        txn.put_task(&record)?;
        txn.commit()?;

        debug!(name = %record.name, subject = %record.subject, "task queued");
        let deadline = task.deadline_for_retry(record.created, 0);
        self.insert(Scheduled {
            deadline,
            record,
            task,
        });
        self.schedule();
        Ok(())
    }

    /// Rehydrate pending task rows through the registry. Returns how many
    /// tasks were loaded; rows whose name or subject no longer resolve are
    /// left untouched and logged.
    pub fn load_pending(&self, registry: &TaskRegistry) -> Result<usize, SchedulerError> {
        let txn = self.store.begin()?;
        let records = txn.list_pending_tasks()?;
        drop(txn);

        let mut loaded = 0;
        for record in records {
            match registry.resolve(&record) {
                Ok(task) => {
                    let deadline = task.deadline_for_retry(record.created, record.retry);
                    self.insert(Scheduled {
                        deadline,
                        record,
                        task,
                    });
                    loaded += 1;
                }
                Err(e) => {
                    warn!(name = %record.name, subject = %record.subject, error = %e,
                        "cannot rehydrate task");
                }
            }
        }
        if loaded > 0 {
            info!(count = loaded, "rehydrated pending tasks");
            self.schedule();
        }
        Ok(loaded)
    }

    fn insert(&self, scheduled: Scheduled) {
        self.pending
            .lock()
            .expect("scheduler pending lock poisoned")
            .push(scheduled);
    }

    /// Hand the nearest due task to a worker, if any. Non-blocking: when the
    /// hand-off slot is occupied the task stays queued for the next tick.
    pub fn schedule(&self) {
        let now = Timestamp::now();
        let mut pending = self
            .pending
            .lock()
            .expect("scheduler pending lock poisoned");
        let due = match pending.peek() {
            Some(next) if next.deadline.is_due(now) => pending.pop().expect("peeked entry"),
            _ => return,
        };
        if let Err(mpsc::error::TrySendError::Full(task)) = self.tx.try_send(due) {
            pending.push(task);
        }
    }

    /// Execute one attempt of `scheduled` and commit the retry bookkeeping.
    pub(crate) async fn run_one(&self, scheduled: Scheduled) -> Result<(), SchedulerError> {
        let Scheduled {
            record, task, ..
        } = scheduled;
        let result = task.execute().await;

        let mut txn = self.store.begin()?;
        let mut record = txn.get_task(&record.id)?.unwrap_or(record);
        match result {
            Ok(()) => {
                record.status = TaskStatus::Succeeded;
                txn.put_task(&record)?;
                txn.commit()?;
                debug!(name = %record.name, subject = %record.subject, "task succeeded");
            }
            Err(e) => {
                record.retry += 1;
                if record.retry > task.max_retries() {
                    record.status = TaskStatus::Failed;
                    txn.put_task(&record)?;
                    txn.commit()?;
                    warn!(name = %record.name, subject = %record.subject, retry = record.retry,
                        error = %e, "task failed terminally");
                } else {
                    txn.put_task(&record)?;
                    txn.commit()?;
                    warn!(name = %record.name, subject = %record.subject, retry = record.retry,
                        error = %e, "task failed, rescheduling");
                    let deadline = task.deadline_for_retry(record.created, record.retry);
                    self.insert(Scheduled {
                        deadline,
                        record,
                        task,
                    });
                    self.schedule();
                }
            }
        }
        Ok(())
    }

    /// Pop and execute the nearest due task directly, bypassing the hand-off
    /// channel. Returns whether a task ran. Used by tests and by shutdown
    /// draining.
    pub async fn run_next_due(&self) -> Result<bool, SchedulerError> {
        let now = Timestamp::now();
        let due = {
            let mut pending = self
                .pending
                .lock()
                .expect("scheduler pending lock poisoned");
            match pending.peek() {
                Some(next) if next.deadline.is_due(now) => {
                    Some(pending.pop().expect("peeked entry"))
                }
                _ => None,
            }
        };
        match due {
            Some(scheduled) => {
                self.run_one(scheduled).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of tasks awaiting execution.
    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .expect("scheduler pending lock poisoned")
            .len()
    }

    /// Signal the worker and ticker loops to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    use crate::task::TaskError;
    use scrip_store_mem::MemStore;

    struct CountingTask {
        max_retries: u32,
        attempts: Arc<AtomicU32>,
        succeed_after: u32,
    }

    #[async_trait]
    impl Task for CountingTask {
        fn name(&self) -> &'static str {
            "counting_task"
        }

        fn subject(&self) -> String {
            "subject".to_string()
        }

        fn max_retries(&self) -> u32 {
            self.max_retries
        }

        fn deadline_for_retry(&self, created: Timestamp, _retry: u32) -> Timestamp {
            // Always due immediately.
            created
        }

        async fn execute(&self) -> Result<(), TaskError> {
            let attempt = self.attempts.fetch_add(1, AtomicOrdering::SeqCst);
            if attempt + 1 >= self.succeed_after {
                Ok(())
            } else {
                Err(TaskError::new("not yet"))
            }
        }
    }

    fn scheduler() -> (Arc<Scheduler>, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        (Scheduler::new(store.clone()), store)
    }

    #[tokio::test]
    async fn succeeding_task_is_marked_succeeded() {
        let (scheduler, store) = scheduler();
        let attempts = Arc::new(AtomicU32::new(0));
        scheduler
            .queue(Arc::new(CountingTask {
                max_retries: 3,
                attempts: attempts.clone(),
                succeed_after: 1,
            }))
            .unwrap();

        assert!(scheduler.run_next_due().await.unwrap());
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(scheduler.pending_len(), 0);

        let txn = store.begin().unwrap();
        assert!(txn.list_pending_tasks().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_task_retries_then_fails_terminally() {
        let (scheduler, store) = scheduler();
        let attempts = Arc::new(AtomicU32::new(0));
        scheduler
            .queue(Arc::new(CountingTask {
                max_retries: 3,
                attempts: attempts.clone(),
                succeed_after: u32::MAX,
            }))
            .unwrap();

        // Grab the persisted id before execution.
        let id = {
            let txn = store.begin().unwrap();
            txn.list_pending_tasks().unwrap()[0].id.clone()
        };

        // max_retries = 3 allows 4 execution attempts in total.
        for _ in 0..4 {
            assert!(scheduler.run_next_due().await.unwrap());
        }
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 4);

        // Terminally failed: nothing left to run, never rescheduled.
        assert!(!scheduler.run_next_due().await.unwrap());
        assert_eq!(scheduler.pending_len(), 0);

        let txn = store.begin().unwrap();
        let record = txn.get_task(&id).unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.retry, 4);
    }

    #[tokio::test]
    async fn retrying_task_eventually_succeeds() {
        let (scheduler, store) = scheduler();
        let attempts = Arc::new(AtomicU32::new(0));
        scheduler
            .queue(Arc::new(CountingTask {
                max_retries: 5,
                attempts: attempts.clone(),
                succeed_after: 3,
            }))
            .unwrap();

        let id = {
            let txn = store.begin().unwrap();
            txn.list_pending_tasks().unwrap()[0].id.clone()
        };

        for _ in 0..3 {
            assert!(scheduler.run_next_due().await.unwrap());
        }
        assert!(!scheduler.run_next_due().await.unwrap());

        let txn = store.begin().unwrap();
        let record = txn.get_task(&id).unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert_eq!(record.retry, 2);
    }

    #[tokio::test]
    async fn future_deadline_is_not_due() {
        struct FutureTask;

        #[async_trait]
        impl Task for FutureTask {
            fn name(&self) -> &'static str {
                "future_task"
            }
            fn subject(&self) -> String {
                "subject".to_string()
            }
            fn max_retries(&self) -> u32 {
                0
            }
            fn deadline_for_retry(&self, created: Timestamp, _retry: u32) -> Timestamp {
                created.plus_secs(3600)
            }
            async fn execute(&self) -> Result<(), TaskError> {
                Ok(())
            }
        }

        let (scheduler, _store) = scheduler();
        scheduler.queue(Arc::new(FutureTask)).unwrap();
        assert!(!scheduler.run_next_due().await.unwrap());
        assert_eq!(scheduler.pending_len(), 1);
    }
}
