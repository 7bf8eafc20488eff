//! In-memory storage backend.
//!
//! Thread-safe store for tests and development. [`MemStore::begin`] snapshots
//! the full state; mutations hit the working copy and [`commit`] swaps it
//! back under the mutex, guarded by a version check so two transactions
//! racing on the same store surface as [`StoreError::Conflict`] instead of
//! silently losing writes.
//!
//! [`commit`]: scrip_store::StoreTxn::commit

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use scrip_store::{
    AssetRecord, AssetStore, BalanceRecord, BalanceStore, CrossingRecord, CrossingStore,
    MintStore, OfferRecord, OfferStore, OperationRecord, OperationStore, StoreError, StoreTxn,
    TaskRecord, TaskStore, TransactionRecord, TransactionStore,
};
use scrip_types::{Address, AssetName, ObjectId, TaskStatus};

#[derive(Clone, Default)]
struct MemState {
    /// Keyed by asset name string.
    assets: HashMap<String, AssetRecord>,
    /// Keyed by `asset|holder` (the unique index).
    balances: HashMap<String, BalanceRecord>,
    /// Keyed by offer id string.
    offers: HashMap<String, OfferRecord>,
    /// Keyed by transaction id string.
    transactions: HashMap<String, TransactionRecord>,
    /// Keyed by operation id string.
    operations: HashMap<String, OperationRecord>,
    /// Keyed by `transaction|hop` (the unique index).
    crossings: HashMap<String, CrossingRecord>,
    /// Keyed by task id.
    tasks: HashMap<String, TaskRecord>,
}

struct Versioned {
    version: u64,
    state: MemState,
}

/// An in-memory mint database.
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Mutex<Versioned>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Versioned {
                version: 0,
                state: MemState::default(),
            })),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MintStore for MemStore {
    fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))?;
        Ok(Box::new(MemTxn {
            shared: Arc::clone(&self.inner),
            base_version: guard.version,
            working: guard.state.clone(),
        }))
    }
}

/// A snapshot transaction over a [`MemStore`].
pub struct MemTxn {
    shared: Arc<Mutex<Versioned>>,
    base_version: u64,
    working: MemState,
}

fn balance_key(asset: &AssetName, holder: &Address) -> String {
    format!("{asset}|{holder}")
}

fn hop_key(transaction: &ObjectId, hop: u8) -> String {
    format!("{transaction}|{hop}")
}

impl AssetStore for MemTxn {
    fn get_asset(&self, name: &AssetName) -> Result<Option<AssetRecord>, StoreError> {
        Ok(self.working.assets.get(&name.to_string()).cloned())
    }

    fn put_asset(&mut self, record: &AssetRecord) -> Result<(), StoreError> {
        let name = record
            .name()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.working.assets.insert(name.to_string(), record.clone());
        Ok(())
    }
}

impl BalanceStore for MemTxn {
    fn get_balance(
        &self,
        asset: &AssetName,
        holder: &Address,
    ) -> Result<Option<BalanceRecord>, StoreError> {
        Ok(self.working.balances.get(&balance_key(asset, holder)).cloned())
    }

    fn get_balance_by_id(&self, id: &ObjectId) -> Result<Option<BalanceRecord>, StoreError> {
        Ok(self
            .working
            .balances
            .values()
            .find(|b| &b.id == id)
            .cloned())
    }

    fn put_balance(&mut self, record: &BalanceRecord) -> Result<(), StoreError> {
        let key = balance_key(&record.asset, &record.holder);
        self.working.balances.insert(key, record.clone());
        Ok(())
    }
}

impl OfferStore for MemTxn {
    fn get_offer(&self, id: &ObjectId) -> Result<Option<OfferRecord>, StoreError> {
        Ok(self.working.offers.get(&id.to_string()).cloned())
    }

    fn put_offer(&mut self, record: &OfferRecord) -> Result<(), StoreError> {
        self.working
            .offers
            .insert(record.id.to_string(), record.clone());
        Ok(())
    }
}

impl TransactionStore for MemTxn {
    fn get_transaction(&self, id: &ObjectId) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.working.transactions.get(&id.to_string()).cloned())
    }

    fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut records: Vec<TransactionRecord> =
            self.working.transactions.values().cloned().collect();
        records.sort_by_key(|t| t.created);
        Ok(records)
    }

    fn put_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.working
            .transactions
            .insert(record.id.to_string(), record.clone());
        Ok(())
    }
}

impl OperationStore for MemTxn {
    fn get_operation_by_id(&self, id: &ObjectId) -> Result<Option<OperationRecord>, StoreError> {
        Ok(self.working.operations.get(&id.to_string()).cloned())
    }

    fn get_operation(
        &self,
        transaction: &ObjectId,
        hop: u8,
    ) -> Result<Option<OperationRecord>, StoreError> {
        Ok(self
            .working
            .operations
            .values()
            .find(|o| o.transaction.as_ref() == Some(transaction) && o.hop == Some(hop))
            .cloned())
    }

    fn list_operations(&self, transaction: &ObjectId) -> Result<Vec<OperationRecord>, StoreError> {
        let mut ops: Vec<OperationRecord> = self
            .working
            .operations
            .values()
            .filter(|o| o.transaction.as_ref() == Some(transaction))
            .cloned()
            .collect();
        ops.sort_by_key(|o| o.hop);
        Ok(ops)
    }

    fn put_operation(&mut self, record: &OperationRecord) -> Result<(), StoreError> {
        // Enforce the (transaction, hop) uniqueness constraint.
        if let (Some(tx), Some(hop)) = (&record.transaction, record.hop) {
            if let Some(existing) = self.get_operation(tx, hop)? {
                if existing.id != record.id {
                    return Err(StoreError::Duplicate(hop_key(tx, hop)));
                }
            }
        }
        self.working
            .operations
            .insert(record.id.to_string(), record.clone());
        Ok(())
    }
}

impl CrossingStore for MemTxn {
    fn get_crossing(
        &self,
        transaction: &ObjectId,
        hop: u8,
    ) -> Result<Option<CrossingRecord>, StoreError> {
        Ok(self.working.crossings.get(&hop_key(transaction, hop)).cloned())
    }

    fn list_crossings(&self, transaction: &ObjectId) -> Result<Vec<CrossingRecord>, StoreError> {
        let mut crossings: Vec<CrossingRecord> = self
            .working
            .crossings
            .values()
            .filter(|c| &c.transaction == transaction)
            .cloned()
            .collect();
        crossings.sort_by_key(|c| c.hop);
        Ok(crossings)
    }

    fn put_crossing(&mut self, record: &CrossingRecord) -> Result<(), StoreError> {
        let key = hop_key(&record.transaction, record.hop);
        if let Some(existing) = self.working.crossings.get(&key) {
            if existing.id != record.id {
                return Err(StoreError::Duplicate(key));
            }
        }
        self.working.crossings.insert(key, record.clone());
        Ok(())
    }
}

impl TaskStore for MemTxn {
    fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.working.tasks.get(id).cloned())
    }

    fn list_pending_tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let mut tasks: Vec<TaskRecord> = self
            .working
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created);
        Ok(tasks)
    }

    fn put_task(&mut self, record: &TaskRecord) -> Result<(), StoreError> {
        self.working.tasks.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

impl StoreTxn for MemTxn {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut guard = self
            .shared
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))?;
        if guard.version != self.base_version {
            return Err(StoreError::Conflict(format!(
                "store advanced from version {} to {}",
                self.base_version, guard.version
            )));
        }
        guard.version += 1;
        guard.state = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrip_types::{Amount, PropagationType, Timestamp, TxStatus};

    fn tx_record(id: &str) -> TransactionRecord {
        TransactionRecord {
            id: ObjectId::parse(id).unwrap(),
            owner: Address::parse("alice@mint-a.example").unwrap(),
            base_asset: AssetName::parse("alice@mint-a.example:USD.2").unwrap(),
            quote_asset: AssetName::parse("alice@mint-a.example:USD.2").unwrap(),
            amount: Amount::new(10),
            destination: Address::parse("bob@mint-a.example").unwrap(),
            path: vec![],
            status: TxStatus::Pending,
            lock: "lock".to_string(),
            secret: None,
            propagation: PropagationType::Canonical,
            created: Timestamp::new(1),
        }
    }

    #[test]
    fn commit_makes_writes_visible() {
        let store = MemStore::new();
        let record = tx_record("alice@mint-a.example[transaction_01]");

        let mut txn = store.begin().unwrap();
        txn.put_transaction(&record).unwrap();
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        assert!(txn.get_transaction(&record.id).unwrap().is_some());
    }

    #[test]
    fn drop_rolls_back() {
        let store = MemStore::new();
        let record = tx_record("alice@mint-a.example[transaction_02]");

        {
            let mut txn = store.begin().unwrap();
            txn.put_transaction(&record).unwrap();
            // dropped without commit
        }

        let txn = store.begin().unwrap();
        assert!(txn.get_transaction(&record.id).unwrap().is_none());
    }

    #[test]
    fn concurrent_commit_conflicts() {
        let store = MemStore::new();
        let a = tx_record("alice@mint-a.example[transaction_03]");
        let b = tx_record("alice@mint-a.example[transaction_04]");

        let mut txn1 = store.begin().unwrap();
        let mut txn2 = store.begin().unwrap();
        txn1.put_transaction(&a).unwrap();
        txn2.put_transaction(&b).unwrap();

        txn1.commit().unwrap();
        assert!(matches!(txn2.commit(), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn duplicate_crossing_hop_rejected() {
        let store = MemStore::new();
        let tx_id = ObjectId::parse("alice@mint-a.example[transaction_05]").unwrap();
        let mut txn = store.begin().unwrap();

        let owner = Address::parse("carol@mint-b.example").unwrap();
        let offer = ObjectId::parse("carol@mint-b.example[offer_01]").unwrap();
        let first = CrossingRecord {
            id: ObjectId::parse("carol@mint-b.example[crossing_01]").unwrap(),
            owner: owner.clone(),
            offer: offer.clone(),
            amount: Amount::new(5),
            status: scrip_types::OpStatus::Reserved,
            transaction: tx_id.clone(),
            hop: 1,
            propagation: PropagationType::Canonical,
            created: Timestamp::new(1),
        };
        txn.put_crossing(&first).unwrap();

        let second = CrossingRecord {
            id: ObjectId::parse("carol@mint-b.example[crossing_02]").unwrap(),
            ..first.clone()
        };
        assert!(matches!(
            txn.put_crossing(&second),
            Err(StoreError::Duplicate(_))
        ));
    }
}
