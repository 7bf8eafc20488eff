//! Worker and ticker loops.
//!
//! One or more workers drain the single-slot hand-off channel; a background
//! ticker re-invokes `schedule` every 10 seconds so deadlines that only
//! mature with time still get picked up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::queue::Scheduler;

/// Interval at which the ticker re-checks the nearest deadline.
const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Spawn `workers` worker loops plus the ticker. All loops stop when
/// [`Scheduler::shutdown`] is signalled.
pub fn spawn(scheduler: &Arc<Scheduler>, workers: usize) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(workers + 1);

    for worker in 0..workers {
        let scheduler = Arc::clone(scheduler);
        handles.push(tokio::spawn(async move {
            let mut shutdown = scheduler.shutdown.subscribe();
            loop {
                let next = {
                    let mut rx = scheduler.rx.lock().await;
                    tokio::select! {
                        next = rx.recv() => next,
                        _ = shutdown.changed() => None,
                    }
                };
                let Some(scheduled) = next else {
                    debug!(worker, "scheduler worker stopping");
                    break;
                };
                if let Err(e) = scheduler.run_one(scheduled).await {
                    error!(worker, error = %e, "task bookkeeping failed");
                }
            }
        }));
    }

    let ticker = Arc::clone(scheduler);
    handles.push(tokio::spawn(async move {
        let mut shutdown = ticker.shutdown.subscribe();
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => ticker.schedule(),
                _ = shutdown.changed() => {
                    debug!("scheduler ticker stopping");
                    break;
                }
            }
        }
    }));

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{timeout, Duration};

    use crate::task::{Task, TaskError};
    use scrip_store_mem::MemStore;
    use scrip_types::Timestamp;

    struct ImmediateTask {
        ran: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Task for ImmediateTask {
        fn name(&self) -> &'static str {
            "immediate_task"
        }
        fn subject(&self) -> String {
            "subject".to_string()
        }
        fn max_retries(&self) -> u32 {
            0
        }
        fn deadline_for_retry(&self, created: Timestamp, _retry: u32) -> Timestamp {
            created
        }
        async fn execute(&self) -> Result<(), TaskError> {
            self.ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_drains_queued_task() {
        let scheduler = Scheduler::new(Arc::new(MemStore::new()));
        let handles = spawn(&scheduler, 2);

        let ran = Arc::new(AtomicU32::new(0));
        scheduler
            .queue(Arc::new(ImmediateTask { ran: ran.clone() }))
            .unwrap();

        timeout(Duration::from_secs(2), async {
            while ran.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("worker never ran the task");

        scheduler.shutdown();
        for handle in handles {
            let _ = timeout(Duration::from_secs(1), handle).await;
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
