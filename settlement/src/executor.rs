//! Hop executor.
//!
//! Reserve, settle and cancel a single `(transaction, hop)`, always inside a
//! caller-provided storage transaction. All three entry points are
//! re-entrant: a retry or repost of the same hop finds the existing rows and
//! leaves every balance and remainder untouched. The uniqueness constraint
//! on `(transaction, hop)` — not a lock — is what makes concurrent duplicate
//! attempts safe.

use scrip_crypto::new_token;
use scrip_ledger as ledger;
use scrip_store::{
    BalanceRecord, CrossingRecord, CrossingStore, OfferRecord, OperationRecord, OperationStore,
    StoreTxn, TransactionRecord,
};
use scrip_types::{id::prefix, ObjectId, OpStatus, PropagationType, Timestamp};

use crate::plan::TxPlan;
use crate::SettlementError;

/// Rows touched by a reserve, for logging and propagation.
#[derive(Debug, Default)]
pub struct ReserveOutcome {
    pub operation: Option<OperationRecord>,
    pub crossing: Option<CrossingRecord>,
    /// The offer whose remainder was consumed.
    pub offer: Option<OfferRecord>,
}

/// Rows touched by a settle.
#[derive(Debug, Default)]
pub struct SettleOutcome {
    pub operation: Option<OperationRecord>,
    pub crossing: Option<CrossingRecord>,
    /// The destination balance credited by the operation.
    pub balance: Option<BalanceRecord>,
}

/// Rows touched by a cancel.
#[derive(Debug, Default)]
pub struct CancelOutcome {
    pub operation: Option<OperationRecord>,
    pub crossing: Option<CrossingRecord>,
    /// The offer whose remainder was reopened.
    pub offer: Option<OfferRecord>,
}

/// Reserve the plan's actions at `hop`: consume the crossed offer's
/// remainder and debit the operation's source balance. The destination
/// credit is deferred to settlement; the offer consumption is applied now
/// but reversibly.
pub fn reserve(
    txn: &mut dyn StoreTxn,
    plan: &TxPlan,
    hop: u8,
    tx: &TransactionRecord,
) -> Result<ReserveOutcome, SettlementError> {
    let planned = plan.hop(hop)?;
    let mut outcome = ReserveOutcome::default();

    if let Some(cr) = &planned.cr {
        if txn.get_crossing(&tx.id, hop)?.is_none() {
            let amount = cr.amount.ok_or_else(|| {
                SettlementError::Internal("crossing amount unresolved in plan".to_string())
            })?;
            let offer = ledger::consume_offer(txn, &cr.offer, amount)?;
            let record = CrossingRecord {
                id: ObjectId::new(cr.owner.clone(), new_token(prefix::CROSSING)),
                owner: cr.owner.clone(),
                offer: cr.offer.clone(),
                amount,
                status: OpStatus::Reserved,
                transaction: tx.id.clone(),
                hop,
                propagation: PropagationType::Canonical,
                created: Timestamp::now(),
            };
            txn.put_crossing(&record)?;
            outcome.offer = Some(offer);
            outcome.crossing = Some(record);
        }
    }

    if let Some(op) = &planned.op {
        if txn.get_operation(&tx.id, hop)?.is_none() {
            let amount = op.amount.ok_or_else(|| {
                SettlementError::Internal("operation amount unresolved in plan".to_string())
            })?;
            if let Some(source) = &op.source {
                // Issuance: the issuer funds its own asset out of thin air.
                if source != op.asset.issuer() {
                    ledger::debit_balance(txn, &op.asset, source, amount)?;
                }
            }
            let record = OperationRecord {
                id: ObjectId::new(op.owner.clone(), new_token(prefix::OPERATION)),
                owner: op.owner.clone(),
                asset: op.asset.clone(),
                source: op.source.clone(),
                destination: op.destination.clone(),
                amount,
                status: OpStatus::Reserved,
                transaction: Some(tx.id.clone()),
                hop: Some(hop),
                propagation: PropagationType::Canonical,
                created: Timestamp::now(),
            };
            txn.put_operation(&record)?;
            outcome.operation = Some(record);
        }
    }

    Ok(outcome)
}

/// Settle the rows reserved at `hop`: credit the operation's destination
/// (annihilation when the destination issues the asset) and flip both rows
/// to `Settled`. Operates on stored rows only, so a shallow plan is enough
/// to route here.
pub fn settle(
    txn: &mut dyn StoreTxn,
    transaction: &ObjectId,
    hop: u8,
) -> Result<SettleOutcome, SettlementError> {
    let mut outcome = SettleOutcome::default();

    if let Some(mut cr) = txn.get_crossing(transaction, hop)? {
        match cr.status {
            OpStatus::Settled => {}
            OpStatus::Canceled => {
                return Err(SettlementError::settlement_failed(format!(
                    "crossing at hop {hop} of {transaction} was canceled"
                )));
            }
            OpStatus::Reserved => {
                cr.status = OpStatus::Settled;
                txn.put_crossing(&cr)?;
                outcome.crossing = Some(cr);
            }
        }
    }

    if let Some(mut op) = txn.get_operation(transaction, hop)? {
        match op.status {
            OpStatus::Settled => {}
            OpStatus::Canceled => {
                return Err(SettlementError::settlement_failed(format!(
                    "operation at hop {hop} of {transaction} was canceled"
                )));
            }
            OpStatus::Reserved => {
                if let Some(destination) = &op.destination {
                    if destination != op.asset.issuer() {
                        outcome.balance =
                            Some(ledger::credit_balance(txn, &op.asset, destination, op.amount)?);
                    }
                }
                op.status = OpStatus::Settled;
                txn.put_operation(&op)?;
                outcome.operation = Some(op);
            }
        }
    }

    Ok(outcome)
}

/// Cancel the rows reserved at `hop`: re-credit the operation's source and
/// reopen the crossed offer's remainder. Settled rows are cancel-proof and
/// untouched; a hop with no rows is a no-op.
pub fn cancel(
    txn: &mut dyn StoreTxn,
    transaction: &ObjectId,
    hop: u8,
) -> Result<CancelOutcome, SettlementError> {
    let mut outcome = CancelOutcome::default();

    if let Some(mut cr) = txn.get_crossing(transaction, hop)? {
        if cr.status == OpStatus::Reserved {
            outcome.offer = Some(ledger::reopen_offer(txn, &cr.offer, cr.amount)?);
            cr.status = OpStatus::Canceled;
            txn.put_crossing(&cr)?;
            outcome.crossing = Some(cr);
        }
    }

    if let Some(mut op) = txn.get_operation(transaction, hop)? {
        if op.status == OpStatus::Reserved {
            if let Some(source) = &op.source {
                if source != op.asset.issuer() {
                    ledger::credit_balance(txn, &op.asset, source, op.amount)?;
                }
            }
            op.status = OpStatus::Canceled;
            txn.put_operation(&op)?;
            outcome.operation = Some(op);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrip_ledger::{create_offer, credit_balance};
    use scrip_store::{BalanceStore, CrossingStore, MintStore, OfferStore, OperationStore};
    use scrip_store_mem::MemStore;
    use scrip_types::{Address, Amount, AssetName, TxStatus};

    use crate::plan::{CrAction, OpAction, PlanHop};

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn asset(s: &str) -> AssetName {
        AssetName::parse(s).unwrap()
    }

    fn tx_record(id_owner: &str) -> TransactionRecord {
        TransactionRecord {
            id: ObjectId::new(addr(id_owner), "transaction_exec"),
            owner: addr(id_owner),
            base_asset: asset("issuer@mint-a.example:USD.2"),
            quote_asset: asset("issuer@mint-a.example:USD.2"),
            amount: Amount::new(10),
            destination: addr("bob@mint-a.example"),
            path: vec![],
            status: TxStatus::Pending,
            lock: "lock".to_string(),
            secret: None,
            propagation: PropagationType::Canonical,
            created: Timestamp::now(),
        }
    }

    /// One hop: 10 USD from alice to bob, plus a 10-unit crossing on bob's
    /// offer.
    fn full_hop_plan(tx: &TransactionRecord, offer: &ObjectId) -> TxPlan {
        TxPlan {
            transaction: tx.id.clone(),
            hops: vec![PlanHop {
                mint: "mint-a.example".to_string(),
                op: Some(OpAction {
                    owner: addr("issuer@mint-a.example"),
                    asset: asset("issuer@mint-a.example:USD.2"),
                    source: Some(addr("alice@mint-a.example")),
                    destination: Some(addr("bob@mint-a.example")),
                    amount: Some(Amount::new(10)),
                }),
                cr: Some(CrAction {
                    owner: offer.owner().clone(),
                    offer: offer.clone(),
                    amount: Some(Amount::new(10)),
                }),
            }],
        }
    }

    fn setup(store: &MemStore) -> (TransactionRecord, TxPlan, ObjectId) {
        let mut txn = store.begin().unwrap();
        credit_balance(
            txn.as_mut(),
            &asset("issuer@mint-a.example:USD.2"),
            &addr("alice@mint-a.example"),
            Amount::new(50),
        )
        .unwrap();
        let offer = create_offer(
            txn.as_mut(),
            &addr("carol@mint-a.example"),
            asset("carol@mint-a.example:EUR.2"),
            asset("issuer@mint-a.example:USD.2"),
            Amount::new(1),
            Amount::new(1),
            Amount::new(100),
        )
        .unwrap();
        txn.commit().unwrap();

        let tx = tx_record("alice@mint-a.example");
        let plan = full_hop_plan(&tx, &offer.id);
        (tx, plan, offer.id)
    }

    fn balance_of(store: &MemStore, asset_name: &str, holder: &str) -> Amount {
        let txn = store.begin().unwrap();
        txn.get_balance(&asset(asset_name), &addr(holder))
            .unwrap()
            .map(|b| b.value)
            .unwrap_or(Amount::ZERO)
    }

    #[test]
    fn reserve_debits_source_and_consumes_offer() {
        let store = MemStore::new();
        let (tx, plan, offer_id) = setup(&store);

        let mut txn = store.begin().unwrap();
        let outcome = reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
        txn.commit().unwrap();

        assert!(outcome.operation.is_some());
        assert!(outcome.crossing.is_some());
        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "alice@mint-a.example"),
            Amount::new(40)
        );
        // Destination credit is deferred to settlement.
        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "bob@mint-a.example"),
            Amount::ZERO
        );
        let txn = store.begin().unwrap();
        assert_eq!(
            txn.get_offer(&offer_id).unwrap().unwrap().remainder,
            Amount::new(90)
        );
    }

    #[test]
    fn reserve_is_idempotent() {
        let store = MemStore::new();
        let (tx, plan, offer_id) = setup(&store);

        for _ in 0..2 {
            let mut txn = store.begin().unwrap();
            reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
            txn.commit().unwrap();
        }

        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "alice@mint-a.example"),
            Amount::new(40)
        );
        let txn = store.begin().unwrap();
        assert_eq!(
            txn.get_offer(&offer_id).unwrap().unwrap().remainder,
            Amount::new(90)
        );
        assert_eq!(txn.list_operations(&tx.id).unwrap().len(), 1);
        assert_eq!(txn.list_crossings(&tx.id).unwrap().len(), 1);
    }

    #[test]
    fn settle_credits_destination_once() {
        let store = MemStore::new();
        let (tx, plan, _offer_id) = setup(&store);

        let mut txn = store.begin().unwrap();
        reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
        txn.commit().unwrap();

        for _ in 0..2 {
            let mut txn = store.begin().unwrap();
            settle(txn.as_mut(), &tx.id, 0).unwrap();
            txn.commit().unwrap();
        }

        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "bob@mint-a.example"),
            Amount::new(10)
        );
        let txn = store.begin().unwrap();
        let op = txn.get_operation(&tx.id, 0).unwrap().unwrap();
        assert_eq!(op.status, OpStatus::Settled);
        let cr = txn.get_crossing(&tx.id, 0).unwrap().unwrap();
        assert_eq!(cr.status, OpStatus::Settled);
    }

    #[test]
    fn conservation_on_direct_transfer() {
        let store = MemStore::new();
        let (tx, mut plan, _offer_id) = setup(&store);
        // Strip the crossing: a pure transfer.
        plan.hops[0].cr = None;

        let source_before =
            balance_of(&store, "issuer@mint-a.example:USD.2", "alice@mint-a.example");
        let dest_before = balance_of(&store, "issuer@mint-a.example:USD.2", "bob@mint-a.example");

        let mut txn = store.begin().unwrap();
        reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
        settle(txn.as_mut(), &tx.id, 0).unwrap();
        txn.commit().unwrap();

        let source_after =
            balance_of(&store, "issuer@mint-a.example:USD.2", "alice@mint-a.example");
        let dest_after = balance_of(&store, "issuer@mint-a.example:USD.2", "bob@mint-a.example");

        assert_eq!(source_before.checked_sub(source_after), Some(Amount::new(10)));
        assert_eq!(dest_after.checked_sub(dest_before), Some(Amount::new(10)));
    }

    #[test]
    fn cancel_reverses_reserve_exactly() {
        let store = MemStore::new();
        let (tx, plan, offer_id) = setup(&store);

        let mut txn = store.begin().unwrap();
        reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
        txn.commit().unwrap();

        for _ in 0..2 {
            let mut txn = store.begin().unwrap();
            cancel(txn.as_mut(), &tx.id, 0).unwrap();
            txn.commit().unwrap();
        }

        // Every touched balance and remainder is back at its pre-reserve
        // value.
        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "alice@mint-a.example"),
            Amount::new(50)
        );
        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "bob@mint-a.example"),
            Amount::ZERO
        );
        let txn = store.begin().unwrap();
        let offer = txn.get_offer(&offer_id).unwrap().unwrap();
        assert_eq!(offer.remainder, Amount::new(100));
        assert_eq!(
            txn.get_operation(&tx.id, 0).unwrap().unwrap().status,
            OpStatus::Canceled
        );
        assert_eq!(
            txn.get_crossing(&tx.id, 0).unwrap().unwrap().status,
            OpStatus::Canceled
        );
    }

    #[test]
    fn settled_hop_is_cancel_proof() {
        let store = MemStore::new();
        let (tx, plan, _offer_id) = setup(&store);

        let mut txn = store.begin().unwrap();
        reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
        settle(txn.as_mut(), &tx.id, 0).unwrap();
        let outcome = cancel(txn.as_mut(), &tx.id, 0).unwrap();
        txn.commit().unwrap();

        assert!(outcome.operation.is_none());
        assert!(outcome.crossing.is_none());
        assert_eq!(
            balance_of(&store, "issuer@mint-a.example:USD.2", "bob@mint-a.example"),
            Amount::new(10)
        );
        let txn = store.begin().unwrap();
        assert_eq!(
            txn.get_operation(&tx.id, 0).unwrap().unwrap().status,
            OpStatus::Settled
        );
    }

    #[test]
    fn settle_of_canceled_hop_fails() {
        let store = MemStore::new();
        let (tx, plan, _offer_id) = setup(&store);

        let mut txn = store.begin().unwrap();
        reserve(txn.as_mut(), &plan, 0, &tx).unwrap();
        cancel(txn.as_mut(), &tx.id, 0).unwrap();
        let err = settle(txn.as_mut(), &tx.id, 0).unwrap_err();
        assert_eq!(err.code(), Some(scrip_types::codes::SETTLEMENT_FAILED));
    }

    #[test]
    fn insufficient_funds_fail_reserve() {
        let store = MemStore::new();
        let (mut tx, mut plan, _offer_id) = setup(&store);
        tx.amount = Amount::new(100);
        plan.hops[0].op.as_mut().unwrap().amount = Some(Amount::new(100));
        plan.hops[0].cr = None;

        let mut txn = store.begin().unwrap();
        let err = reserve(txn.as_mut(), &plan, 0, &tx).unwrap_err();
        assert_eq!(err.code(), Some(scrip_types::codes::INSUFFICIENT_BALANCE));
    }
}
