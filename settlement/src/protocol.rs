//! Propagation protocol.
//!
//! Create, settle and cancel recurse across the mints of a transaction's
//! plan, one hop per call. No step ever needs global knowledge: every
//! decision consults at most the adjacent hop, which bounds the blast radius
//! of a failing or lying mint to its immediate neighbors.
//!
//! Within a request, local state is committed before any further remote call
//! so that a downstream failure after commit degrades into an async retry
//! task instead of an inconsistency.

use std::sync::{Arc, Weak};

use tracing::{info, warn};

use scrip_client::{MintClient, TransactionResource};
use scrip_crypto::{check_lock, compute_lock, new_secret, new_token};
use scrip_scheduler::Scheduler;
use scrip_store::{
    CrossingStore, MintStore, OperationStore, StoreTxn, TransactionRecord, TransactionStore,
};
use scrip_types::{
    codes, id::prefix, Address, Amount, AssetName, MintParams, ObjectId, OpStatus,
    PropagationType, Timestamp, TxStatus, UserError,
};

use crate::executor;
use crate::plan::TxPlan;
use crate::tasks;
use crate::SettlementError;

/// The per-mint settlement service.
///
/// Constructed once at startup and shared by reference; several instances
/// with distinct hosts and stores can coexist in one process.
pub struct Settlement {
    host: String,
    store: Arc<dyn MintStore>,
    client: Arc<dyn MintClient>,
    scheduler: Arc<Scheduler>,
    params: MintParams,
    me: Weak<Settlement>,
}

impl Settlement {
    pub fn new(
        host: impl Into<String>,
        store: Arc<dyn MintStore>,
        client: Arc<dyn MintClient>,
        scheduler: Arc<Scheduler>,
        params: MintParams,
    ) -> Arc<Self> {
        let host = host.into();
        Arc::new_cyclic(|me| Self {
            host,
            store,
            client,
            scheduler,
            params,
            me: me.clone(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn params(&self) -> &MintParams {
        &self.params
    }

    pub fn store(&self) -> &Arc<dyn MintStore> {
        &self.store
    }

    pub fn client(&self) -> &Arc<dyn MintClient> {
        &self.client
    }

    pub(crate) fn weak(&self) -> Weak<Settlement> {
        self.me.clone()
    }

    // ── Create ───────────────────────────────────────────────────────────

    /// Create a transaction at its canonical mint and drive the reservation
    /// across the whole path. On return the transaction is `Reserved`; any
    /// forward-path failure surfaces as 402 `transaction_failed` and leaves
    /// cleanup to the expiry task.
    pub async fn create(
        &self,
        caller: &Address,
        base_asset: AssetName,
        quote_asset: AssetName,
        amount: Amount,
        destination: Address,
        path: Vec<ObjectId>,
    ) -> Result<TransactionResource, SettlementError> {
        if caller.host() != self.host {
            return Err(SettlementError::User(UserError::with_status(
                codes::NOT_AUTHORIZED,
                401,
                format!("{caller} is not a user of this mint"),
            )));
        }
        if amount.is_zero() {
            return Err(SettlementError::amount_invalid(
                "transaction amount must be positive",
            ));
        }

        let token = new_token(prefix::TRANSACTION);
        let secret = new_secret();
        let lock = compute_lock(&secret, &token)?;
        let record = TransactionRecord {
            id: ObjectId::new(caller.clone(), token),
            owner: caller.clone(),
            base_asset,
            quote_asset,
            amount,
            destination,
            path,
            status: TxStatus::Pending,
            lock,
            secret: Some(secret),
            propagation: PropagationType::Canonical,
            created: Timestamp::now(),
        };

        // Plan before persisting: a bad path fails the request without
        // leaving a pending transaction behind.
        let plan = TxPlan::compute(self.client.as_ref(), &record, false).await?;

        let mut txn = self.store.begin()?;
        txn.put_transaction(&record)?;
        txn.commit()?;
        self.queue_expiry(&record.id);

        info!(id = %record.id, hops = plan.hops.len(), "transaction created, reserving path");

        // Virtual top hop: recurse into the highest real hop. The chain
        // reserves hop by hop on its way down to hop 0.
        let top = (plan.hops.len() - 1) as u8;
        self.client
            .create_transaction(&record.id, top, &plan.hops[top as usize].mint)
            .await?;

        let mut txn = self.store.begin()?;
        let mut record = self.load_transaction(txn.as_ref(), &record.id)?;
        if record.status == TxStatus::Pending {
            record.status = TxStatus::Reserved;
            txn.put_transaction(&record)?;
        }
        let resource = self.transaction_resource(txn.as_ref(), &record)?;
        txn.commit()?;
        Ok(resource)
    }

    /// Handle a propagated create at `hop`: load or fetch the transaction,
    /// validate the hop above against our own plan, reserve locally, then
    /// recurse towards hop 0.
    pub async fn handle_create(
        &self,
        id: &ObjectId,
        hop: u8,
    ) -> Result<TransactionResource, SettlementError> {
        let record = self.load_or_fetch_transaction(id).await?;
        let plan = TxPlan::compute(self.client.as_ref(), &record, false).await?;

        let planned = plan.hop(hop)?;
        if planned.mint != self.host {
            return Err(SettlementError::transaction_failed(format!(
                "hop {hop} of {id} belongs to {}, not {}",
                planned.mint, self.host
            )));
        }

        // Validate what the mint above us has advertised before committing
        // anything on its behalf.
        let above = hop + 1;
        if (above as usize) < plan.hops.len() {
            plan.check(self.client.as_ref(), above).await?;
        }

        let mut txn = self.store.begin()?;
        let outcome = executor::reserve(txn.as_mut(), &plan, hop, &record)?;
        txn.commit()?;
        if let Some(offer) = &outcome.offer {
            self.queue_offer_propagation(&offer.id);
        }

        if hop > 0 {
            let below = hop - 1;
            self.client
                .create_transaction(id, below, &plan.hops[below as usize].mint)
                .await?;
        }

        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        self.transaction_resource(txn.as_ref(), &record)
    }

    // ── Settle ───────────────────────────────────────────────────────────

    /// Owner-initiated settlement at the canonical mint: reveal the secret
    /// and propagate it down the chain.
    pub async fn settle(
        &self,
        caller: &Address,
        id: &ObjectId,
    ) -> Result<TransactionResource, SettlementError> {
        let txn = self.store.begin()?;
        let mut record = self.load_transaction(txn.as_ref(), id)?;
        drop(txn);

        if &record.owner != caller {
            return Err(SettlementError::User(UserError::with_status(
                codes::NOT_AUTHORIZED,
                401,
                format!("{caller} does not own {id}"),
            )));
        }
        if record.status == TxStatus::Settled {
            let txn = self.store.begin()?;
            return self.transaction_resource(txn.as_ref(), &record);
        }
        if record.status != TxStatus::Reserved {
            return Err(SettlementError::settlement_failed(format!(
                "transaction {id} is {}, not reserved",
                record.status
            )));
        }
        let secret = record.secret.clone().ok_or_else(|| {
            SettlementError::Internal(format!("canonical transaction {id} has no secret"))
        })?;

        let mut txn = self.store.begin()?;
        record.status = TxStatus::Settled;
        txn.put_transaction(&record)?;
        txn.commit()?;
        info!(id = %id, "transaction settled at canonical mint, propagating secret");

        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let top = (plan.hops.len() - 1) as u8;
        if let Err(e) = self
            .client
            .settle_transaction(id, top, &secret, &plan.hops[top as usize].mint)
            .await
        {
            warn!(id = %id, hop = top, error = %e, "settlement propagation failed, queueing retry");
            self.queue_task(tasks::PropagateSettlement::new(
                self.weak(),
                id.clone(),
                top,
                self.params,
            ));
        }

        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        self.transaction_resource(txn.as_ref(), &record)
    }

    /// Handle a propagated settle at `hop`: verify the revealed secret
    /// against the lock, bail out into cancellation if the hop above has
    /// already given up, settle locally, then propagate down.
    pub async fn handle_settle(
        &self,
        id: &ObjectId,
        hop: u8,
        secret: &str,
    ) -> Result<TransactionResource, SettlementError> {
        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        drop(txn);

        if !check_lock(secret, id.token(), &record.lock)? {
            return Err(SettlementError::settlement_failed(format!(
                "secret does not open the lock of {id}"
            )));
        }

        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let planned = plan.hop(hop)?;
        if planned.mint != self.host {
            return Err(SettlementError::settlement_failed(format!(
                "hop {hop} of {id} belongs to {}, not {}",
                planned.mint, self.host
            )));
        }

        // A settlement racing a cancellation is doomed: if the hop above us
        // already canceled, settling here would pay out with no matching
        // payment in. Cancel instead.
        let above = hop + 1;
        if (above as usize) < plan.hops.len() && self.neighbor_canceled(&plan, above).await {
            warn!(id = %id, hop, "upstream hop canceled, canceling instead of settling");
            return self.handle_cancel(id, hop).await;
        }

        let (min_hop, _) = plan.min_max_hop(&self.host)?;
        let mut txn = self.store.begin()?;
        let mut record = self.load_transaction(txn.as_ref(), id)?;
        let outcome = executor::settle(txn.as_mut(), id, hop)?;
        record.secret = Some(secret.to_string());
        if hop == min_hop && record.status.can_transition_to(TxStatus::Settled) {
            record.status = TxStatus::Settled;
        }
        txn.put_transaction(&record)?;
        txn.commit()?;

        // Interested mints learn about the new balance and operation state
        // asynchronously.
        if let Some(op) = &outcome.operation {
            self.queue_task(tasks::PropagateOperation::new(
                self.weak(),
                op.id.clone(),
                self.params,
            ));
        }
        if let Some(balance) = &outcome.balance {
            if balance.holder.host() != self.host {
                self.queue_task(tasks::PropagateBalance::new(
                    self.weak(),
                    balance.id.clone(),
                    self.params,
                ));
            }
        }

        if hop > 0 {
            let below = hop - 1;
            if let Err(e) = self
                .client
                .settle_transaction(id, below, secret, &plan.hops[below as usize].mint)
                .await
            {
                warn!(id = %id, hop = below, error = %e,
                    "settlement propagation failed, queueing retry");
                self.queue_task(tasks::PropagateSettlement::new(
                    self.weak(),
                    id.clone(),
                    below,
                    self.params,
                ));
            }
        }

        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        self.transaction_resource(txn.as_ref(), &record)
    }

    // ── Cancel ───────────────────────────────────────────────────────────

    /// Owner-initiated cancellation at the canonical mint. Drives a cancel
    /// through the terminal hop; the chain then unwinds towards hop 0.
    pub async fn cancel(
        &self,
        caller: &Address,
        id: &ObjectId,
    ) -> Result<TransactionResource, SettlementError> {
        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        drop(txn);

        if &record.owner != caller {
            return Err(SettlementError::User(UserError::with_status(
                codes::NOT_AUTHORIZED,
                401,
                format!("{caller} does not own {id}"),
            )));
        }
        if record.status == TxStatus::Settled {
            return Err(SettlementError::cancellation_not_authorized(format!(
                "transaction {id} already settled"
            )));
        }

        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let top = (plan.hops.len() - 1) as u8;
        if let Err(e) = self
            .client
            .cancel_transaction(id, top, &plan.hops[top as usize].mint)
            .await
        {
            warn!(id = %id, hop = top, error = %e, "cancellation propagation failed, queueing retry");
            self.queue_task(tasks::PropagateCancellation::new(
                self.weak(),
                id.clone(),
                top,
                self.params,
            ));
        }

        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        self.transaction_resource(txn.as_ref(), &record)
    }

    /// Handle a propagated cancel at `hop`.
    ///
    /// A mint may cancel a hop only when it is the terminal hop of the path
    /// or its downstream neighbor has already canceled (a remote
    /// `transaction_not_found` counts as canceled). The transaction itself
    /// flips to `Canceled` only once the lowest local hop has been
    /// processed, so a mint appearing twice on the path does not release the
    /// transaction early.
    pub async fn handle_cancel(
        &self,
        id: &ObjectId,
        hop: u8,
    ) -> Result<TransactionResource, SettlementError> {
        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        drop(txn);

        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let planned = plan.hop(hop)?;
        if planned.mint != self.host {
            return Err(SettlementError::cancellation_not_authorized(format!(
                "hop {hop} of {id} belongs to {}, not {}",
                planned.mint, self.host
            )));
        }

        let terminal = hop as usize == plan.hops.len() - 1;
        let above = hop + 1;
        if !terminal && !self.neighbor_canceled(&plan, above).await {
            return Err(SettlementError::cancellation_not_authorized(format!(
                "hop {above} of {id} has not canceled"
            )));
        }

        let (min_hop, _) = plan.min_max_hop(&self.host)?;
        let mut txn = self.store.begin()?;
        let mut record = self.load_transaction(txn.as_ref(), id)?;
        let outcome = executor::cancel(txn.as_mut(), id, hop)?;
        if hop == min_hop && record.status.can_transition_to(TxStatus::Canceled) {
            record.status = TxStatus::Canceled;
            txn.put_transaction(&record)?;
        }
        txn.commit()?;
        info!(id = %id, hop, "hop canceled");

        if let Some(offer) = &outcome.offer {
            self.queue_offer_propagation(&offer.id);
        }

        if hop > 0 {
            let below = hop - 1;
            if let Err(e) = self
                .client
                .cancel_transaction(id, below, &plan.hops[below as usize].mint)
                .await
            {
                warn!(id = %id, hop = below, error = %e,
                    "cancellation propagation failed, queueing retry");
                self.queue_task(tasks::PropagateCancellation::new(
                    self.weak(),
                    id.clone(),
                    below,
                    self.params,
                ));
            }
        }

        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        self.transaction_resource(txn.as_ref(), &record)
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// The transaction as this mint advertises it, with per-hop operations
    /// and crossings. The secret stays hidden until settlement.
    pub async fn retrieve(&self, id: &ObjectId) -> Result<TransactionResource, SettlementError> {
        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        self.transaction_resource(txn.as_ref(), &record)
    }

    // ── Task drivers ─────────────────────────────────────────────────────

    /// Retry a settle call towards `hop`'s mint. A remote
    /// `transaction_not_found` means that mint never reserved — nothing to
    /// settle there.
    pub async fn settle_at_hop(&self, id: &ObjectId, hop: u8) -> Result<(), SettlementError> {
        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        drop(txn);
        let secret = record.secret.clone().ok_or_else(|| {
            SettlementError::Internal(format!("secret of {id} not revealed yet"))
        })?;

        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let planned = plan.hop(hop)?;
        match self
            .client
            .settle_transaction(id, hop, &secret, &planned.mint)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_transaction_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Retry a cancel call towards `hop`'s mint.
    pub async fn cancel_at_hop(&self, id: &ObjectId, hop: u8) -> Result<(), SettlementError> {
        let txn = self.store.begin()?;
        let record = self.load_transaction(txn.as_ref(), id)?;
        drop(txn);

        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let planned = plan.hop(hop)?;
        match self.client.cancel_transaction(id, hop, &planned.mint).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_transaction_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Expiry: if the transaction has not settled, drive a real cancel
    /// through this mint's highest hop. Retried with backoff until the
    /// neighbor-consensus rule lets the cancellation through.
    pub async fn expire(&self, id: &ObjectId) -> Result<(), SettlementError> {
        let txn = self.store.begin()?;
        let record = match txn.get_transaction(id)? {
            Some(record) => record,
            None => return Ok(()),
        };
        drop(txn);
        if record.status.is_terminal() {
            return Ok(());
        }

        info!(id = %id, "transaction expired, driving cancellation");
        let plan = TxPlan::compute(self.client.as_ref(), &record, true).await?;
        let (_, max_hop) = plan.min_max_hop(&self.host)?;
        self.handle_cancel(id, max_hop).await.map(|_| ())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn load_transaction(
        &self,
        txn: &dyn StoreTxn,
        id: &ObjectId,
    ) -> Result<TransactionRecord, SettlementError> {
        txn.get_transaction(id)?.ok_or_else(|| {
            SettlementError::not_found(
                codes::TRANSACTION_NOT_FOUND,
                format!("transaction not found: {id}"),
            )
        })
    }

    /// Load the local copy of a transaction, fetching and committing the
    /// propagated shadow from its canonical mint on first contact. The
    /// expiry task rides along with the copy so this mint can self-heal
    /// even if it never hears from the path again.
    async fn load_or_fetch_transaction(
        &self,
        id: &ObjectId,
    ) -> Result<TransactionRecord, SettlementError> {
        {
            let txn = self.store.begin()?;
            if let Some(record) = txn.get_transaction(id)? {
                return Ok(record);
            }
        }

        let resource = self
            .client
            .retrieve_transaction(id, None)
            .await
            .map_err(|e| {
                SettlementError::transaction_failed(format!(
                    "cannot retrieve canonical transaction {id}: {e}"
                ))
            })?;
        if &resource.id != id {
            return Err(SettlementError::transaction_failed(format!(
                "canonical mint advertised {} for {id}",
                resource.id
            )));
        }
        let mut record = resource.into_record(PropagationType::Propagated);
        record.secret = None;
        record.status = TxStatus::Pending;

        let mut txn = self.store.begin()?;
        txn.put_transaction(&record)?;
        txn.commit()?;
        self.queue_expiry(id);
        Ok(record)
    }

    /// Whether the mint executing `hop` has given up on the transaction:
    /// it has no record of it, or everything it reserved at that hop is
    /// canceled.
    async fn neighbor_canceled(&self, plan: &TxPlan, hop: u8) -> bool {
        let mint = &plan.hops[hop as usize].mint;
        match self
            .client
            .retrieve_transaction(&plan.transaction, Some(mint))
            .await
        {
            Ok(resource) => {
                let op = resource.operation_at(hop);
                let cr = resource.crossing_at(hop);
                if op.is_none() && cr.is_none() {
                    // Nothing reserved there: either a hop with no actions
                    // or a mint that never got to reserve. Nothing at stake.
                    return true;
                }
                op.map_or(true, |o| o.status == OpStatus::Canceled)
                    && cr.map_or(true, |c| c.status == OpStatus::Canceled)
            }
            Err(e) if e.is_transaction_not_found() => true,
            Err(e) => {
                warn!(id = %plan.transaction, hop, mint = %mint, error = %e,
                    "neighbor state unavailable");
                false
            }
        }
    }

    pub(crate) fn transaction_resource(
        &self,
        txn: &dyn StoreTxn,
        record: &TransactionRecord,
    ) -> Result<TransactionResource, SettlementError> {
        let operations = txn
            .list_operations(&record.id)?
            .iter()
            .map(Into::into)
            .collect();
        let crossings = txn
            .list_crossings(&record.id)?
            .iter()
            .map(Into::into)
            .collect();
        Ok(TransactionResource {
            id: record.id.clone(),
            owner: record.owner.clone(),
            base_asset: record.base_asset.clone(),
            quote_asset: record.quote_asset.clone(),
            amount: record.amount,
            destination: record.destination.clone(),
            path: record.path.clone(),
            status: record.status,
            lock: record.lock.clone(),
            // The secret is only ever revealed through settlement.
            secret: match record.status {
                TxStatus::Settled => record.secret.clone(),
                _ => None,
            },
            operations,
            crossings,
            created: record.created,
        })
    }

    fn queue_expiry(&self, id: &ObjectId) {
        self.queue_task(tasks::ExpireTransaction::new(
            self.weak(),
            id.clone(),
            self.params,
        ));
    }

    fn queue_offer_propagation(&self, offer: &ObjectId) {
        self.queue_task(tasks::PropagateOffer::new(
            self.weak(),
            offer.clone(),
            self.params,
        ));
    }

    fn queue_task(&self, task: impl scrip_scheduler::Task + 'static) {
        if let Err(e) = self.scheduler.queue(Arc::new(task)) {
            warn!(error = %e, "failed to queue retry task");
        }
    }
}
