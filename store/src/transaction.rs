//! Transaction storage trait.

use scrip_types::{Address, Amount, AssetName, ObjectId, PropagationType, Timestamp, TxStatus};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A cross-mint payment: `amount` of `quote_asset` delivered to
/// `destination`, funded in `base_asset` by the owner through the offers in
/// `path`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: ObjectId,
    pub owner: Address,
    pub base_asset: AssetName,
    pub quote_asset: AssetName,
    pub amount: Amount,
    pub destination: Address,
    /// Ordered offer ids connecting `base_asset` to `quote_asset`.
    pub path: Vec<ObjectId>,
    pub status: TxStatus,
    /// `hex(scrypt(secret, id.token))` — settlement requires the secret.
    pub lock: String,
    /// Kept only at the canonical mint until settlement reveals it.
    pub secret: Option<String>,
    pub propagation: PropagationType,
    pub created: Timestamp,
}

/// Trait for transaction storage operations.
pub trait TransactionStore {
    fn get_transaction(&self, id: &ObjectId) -> Result<Option<TransactionRecord>, StoreError>;
    /// All transactions this mint knows about, for operational inspection.
    fn list_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError>;
    fn put_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError>;
}
