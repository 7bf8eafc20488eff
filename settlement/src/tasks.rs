//! Concrete retry tasks.
//!
//! Every task is reconstructible from `(name, subject)` alone — the subject
//! is the entity id, with `|hop` appended for the per-hop tasks — so the
//! scheduler can rehydrate the persisted task log on boot through
//! [`registry`].

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use scrip_scheduler::{join_subject, split_subject, SchedulerError, Task, TaskError, TaskRegistry};
use scrip_store::{BalanceStore, MintStore, OfferStore, OperationStore};
use scrip_types::{MintParams, ObjectId, Timestamp};

use crate::protocol::Settlement;

pub const PROPAGATE_OPERATION: &str = "propagate_operation";
pub const PROPAGATE_OFFER: &str = "propagate_offer";
pub const PROPAGATE_BALANCE: &str = "propagate_balance";
pub const PROPAGATE_SETTLEMENT: &str = "propagate_settlement";
pub const PROPAGATE_CANCELLATION: &str = "propagate_cancellation";
pub const EXPIRE_TRANSACTION: &str = "expire_transaction";

/// Deadline for propagation retries: `created + (2^retry - 1)` seconds, so
/// the first attempt is immediate and the interval doubles from there.
fn propagation_deadline(created: Timestamp, retry: u32) -> Timestamp {
    let secs = 1u64
        .checked_shl(retry)
        .map(|pow| pow - 1)
        .unwrap_or(u64::MAX);
    created.plus_secs(secs)
}

fn upgraded(settlement: &Weak<Settlement>) -> Result<Arc<Settlement>, TaskError> {
    settlement
        .upgrade()
        .ok_or_else(|| TaskError::new("mint is shutting down"))
}

fn run_error(e: impl std::fmt::Display) -> TaskError {
    TaskError::new(e.to_string())
}

// ── Propagation of updated resources ─────────────────────────────────────

/// Push an updated operation to the mints of its source and destination.
pub struct PropagateOperation {
    settlement: Weak<Settlement>,
    id: ObjectId,
    params: MintParams,
}

impl PropagateOperation {
    pub fn new(settlement: Weak<Settlement>, id: ObjectId, params: MintParams) -> Self {
        Self {
            settlement,
            id,
            params,
        }
    }
}

#[async_trait]
impl Task for PropagateOperation {
    fn name(&self) -> &'static str {
        PROPAGATE_OPERATION
    }

    fn subject(&self) -> String {
        self.id.to_string()
    }

    fn max_retries(&self) -> u32 {
        self.params.propagation_max_retries
    }

    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp {
        propagation_deadline(created, retry)
    }

    async fn execute(&self) -> Result<(), TaskError> {
        let settlement = upgraded(&self.settlement)?;
        let txn = settlement.store().begin().map_err(run_error)?;
        let op = txn
            .get_operation_by_id(&self.id)
            .map_err(run_error)?
            .ok_or_else(|| run_error(format!("operation not found: {}", self.id)))?;
        drop(txn);

        let mut hosts: Vec<String> = op
            .source
            .iter()
            .chain(op.destination.iter())
            .map(|a| a.host().to_string())
            .filter(|h| h != settlement.host())
            .collect();
        hosts.sort();
        hosts.dedup();

        for host in hosts {
            settlement
                .client()
                .propagate_operation(&self.id, &host)
                .await
                .map_err(run_error)?;
        }
        Ok(())
    }
}

/// Push an updated offer (remainder, status) to the mint of its quote asset.
pub struct PropagateOffer {
    settlement: Weak<Settlement>,
    id: ObjectId,
    params: MintParams,
}

impl PropagateOffer {
    pub fn new(settlement: Weak<Settlement>, id: ObjectId, params: MintParams) -> Self {
        Self {
            settlement,
            id,
            params,
        }
    }
}

#[async_trait]
impl Task for PropagateOffer {
    fn name(&self) -> &'static str {
        PROPAGATE_OFFER
    }

    fn subject(&self) -> String {
        self.id.to_string()
    }

    fn max_retries(&self) -> u32 {
        self.params.propagation_max_retries
    }

    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp {
        propagation_deadline(created, retry)
    }

    async fn execute(&self) -> Result<(), TaskError> {
        let settlement = upgraded(&self.settlement)?;
        let txn = settlement.store().begin().map_err(run_error)?;
        let offer = txn
            .get_offer(&self.id)
            .map_err(run_error)?
            .ok_or_else(|| run_error(format!("offer not found: {}", self.id)))?;
        drop(txn);

        let host = offer.quote_asset.issuer().host();
        if host != settlement.host() {
            settlement
                .client()
                .propagate_offer(&self.id, host)
                .await
                .map_err(run_error)?;
        }
        Ok(())
    }
}

/// Push an updated balance to the mint of its holder.
pub struct PropagateBalance {
    settlement: Weak<Settlement>,
    id: ObjectId,
    params: MintParams,
}

impl PropagateBalance {
    pub fn new(settlement: Weak<Settlement>, id: ObjectId, params: MintParams) -> Self {
        Self {
            settlement,
            id,
            params,
        }
    }
}

#[async_trait]
impl Task for PropagateBalance {
    fn name(&self) -> &'static str {
        PROPAGATE_BALANCE
    }

    fn subject(&self) -> String {
        self.id.to_string()
    }

    fn max_retries(&self) -> u32 {
        self.params.propagation_max_retries
    }

    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp {
        propagation_deadline(created, retry)
    }

    async fn execute(&self) -> Result<(), TaskError> {
        let settlement = upgraded(&self.settlement)?;
        let txn = settlement.store().begin().map_err(run_error)?;
        let balance = txn
            .get_balance_by_id(&self.id)
            .map_err(run_error)?
            .ok_or_else(|| run_error(format!("balance not found: {}", self.id)))?;
        drop(txn);

        let host = balance.holder.host();
        if host != settlement.host() {
            settlement
                .client()
                .propagate_balance(&self.id, host)
                .await
                .map_err(run_error)?;
        }
        Ok(())
    }
}

// ── Per-hop protocol retries ─────────────────────────────────────────────

/// Re-drive a settle call towards a hop whose mint was unreachable.
pub struct PropagateSettlement {
    settlement: Weak<Settlement>,
    id: ObjectId,
    hop: u8,
    params: MintParams,
}

impl PropagateSettlement {
    pub fn new(settlement: Weak<Settlement>, id: ObjectId, hop: u8, params: MintParams) -> Self {
        Self {
            settlement,
            id,
            hop,
            params,
        }
    }
}

#[async_trait]
impl Task for PropagateSettlement {
    fn name(&self) -> &'static str {
        PROPAGATE_SETTLEMENT
    }

    fn subject(&self) -> String {
        join_subject(&self.id.to_string(), self.hop)
    }

    fn max_retries(&self) -> u32 {
        self.params.propagation_max_retries
    }

    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp {
        propagation_deadline(created, retry)
    }

    async fn execute(&self) -> Result<(), TaskError> {
        let settlement = upgraded(&self.settlement)?;
        settlement
            .settle_at_hop(&self.id, self.hop)
            .await
            .map_err(run_error)
    }
}

/// Re-drive a cancel call towards a hop whose mint was unreachable.
pub struct PropagateCancellation {
    settlement: Weak<Settlement>,
    id: ObjectId,
    hop: u8,
    params: MintParams,
}

impl PropagateCancellation {
    pub fn new(settlement: Weak<Settlement>, id: ObjectId, hop: u8, params: MintParams) -> Self {
        Self {
            settlement,
            id,
            hop,
            params,
        }
    }
}

#[async_trait]
impl Task for PropagateCancellation {
    fn name(&self) -> &'static str {
        PROPAGATE_CANCELLATION
    }

    fn subject(&self) -> String {
        join_subject(&self.id.to_string(), self.hop)
    }

    fn max_retries(&self) -> u32 {
        self.params.propagation_max_retries
    }

    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp {
        propagation_deadline(created, retry)
    }

    async fn execute(&self) -> Result<(), TaskError> {
        let settlement = upgraded(&self.settlement)?;
        settlement
            .cancel_at_hop(&self.id, self.hop)
            .await
            .map_err(run_error)
    }
}

/// Cancel a transaction that has not settled within its expiry window.
pub struct ExpireTransaction {
    settlement: Weak<Settlement>,
    id: ObjectId,
    params: MintParams,
}

impl ExpireTransaction {
    pub fn new(settlement: Weak<Settlement>, id: ObjectId, params: MintParams) -> Self {
        Self {
            settlement,
            id,
            params,
        }
    }
}

#[async_trait]
impl Task for ExpireTransaction {
    fn name(&self) -> &'static str {
        EXPIRE_TRANSACTION
    }

    fn subject(&self) -> String {
        self.id.to_string()
    }

    fn max_retries(&self) -> u32 {
        self.params.expiry_max_retries
    }

    /// Fires one expiry window after creation, pushed out by a further
    /// window on every retry.
    fn deadline_for_retry(&self, created: Timestamp, retry: u32) -> Timestamp {
        created.plus_millis((u64::from(retry) + 1) * self.params.transaction_expiry_ms)
    }

    async fn execute(&self) -> Result<(), TaskError> {
        let settlement = upgraded(&self.settlement)?;
        settlement.expire(&self.id).await.map_err(run_error)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

fn parse_id(name: &str, subject: &str) -> Result<ObjectId, SchedulerError> {
    ObjectId::parse(subject).map_err(|_| SchedulerError::InvalidSubject {
        name: name.to_string(),
        subject: subject.to_string(),
    })
}

fn parse_id_hop(name: &str, subject: &str) -> Result<(ObjectId, u8), SchedulerError> {
    let invalid = || SchedulerError::InvalidSubject {
        name: name.to_string(),
        subject: subject.to_string(),
    };
    let (id, hop) = split_subject(subject).ok_or_else(invalid)?;
    let id = ObjectId::parse(id).map_err(|_| invalid())?;
    Ok((id, hop))
}

/// Build the boot-time task registry for one mint instance.
pub fn registry(settlement: &Arc<Settlement>) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    let params = *settlement.params();

    let weak = Arc::downgrade(settlement);
    registry.register(PROPAGATE_OPERATION, move |subject| {
        let id = parse_id(PROPAGATE_OPERATION, subject)?;
        Ok(Arc::new(PropagateOperation::new(weak.clone(), id, params)))
    });

    let weak = Arc::downgrade(settlement);
    registry.register(PROPAGATE_OFFER, move |subject| {
        let id = parse_id(PROPAGATE_OFFER, subject)?;
        Ok(Arc::new(PropagateOffer::new(weak.clone(), id, params)))
    });

    let weak = Arc::downgrade(settlement);
    registry.register(PROPAGATE_BALANCE, move |subject| {
        let id = parse_id(PROPAGATE_BALANCE, subject)?;
        Ok(Arc::new(PropagateBalance::new(weak.clone(), id, params)))
    });

    let weak = Arc::downgrade(settlement);
    registry.register(PROPAGATE_SETTLEMENT, move |subject| {
        let (id, hop) = parse_id_hop(PROPAGATE_SETTLEMENT, subject)?;
        Ok(Arc::new(PropagateSettlement::new(
            weak.clone(),
            id,
            hop,
            params,
        )))
    });

    let weak = Arc::downgrade(settlement);
    registry.register(PROPAGATE_CANCELLATION, move |subject| {
        let (id, hop) = parse_id_hop(PROPAGATE_CANCELLATION, subject)?;
        Ok(Arc::new(PropagateCancellation::new(
            weak.clone(),
            id,
            hop,
            params,
        )))
    });

    let weak = Arc::downgrade(settlement);
    registry.register(EXPIRE_TRANSACTION, move |subject| {
        let id = parse_id(EXPIRE_TRANSACTION, subject)?;
        Ok(Arc::new(ExpireTransaction::new(weak.clone(), id, params)))
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagation_backoff_doubles() {
        let created = Timestamp::new(0);
        assert_eq!(propagation_deadline(created, 0), Timestamp::new(0));
        assert_eq!(propagation_deadline(created, 1), Timestamp::new(1_000));
        assert_eq!(propagation_deadline(created, 2), Timestamp::new(3_000));
        assert_eq!(propagation_deadline(created, 3), Timestamp::new(7_000));
        assert_eq!(propagation_deadline(created, 10), Timestamp::new(1_023_000));
    }

    #[test]
    fn shift_overflow_saturates() {
        let created = Timestamp::new(0);
        // Far past any configured retry cap, but must not panic.
        let deadline = propagation_deadline(created, 200);
        assert!(deadline > Timestamp::new(u64::MAX / 2));
    }
}
