//! Operation storage trait.

use scrip_types::{Address, Amount, AssetName, ObjectId, OpStatus, PropagationType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A balance-affecting movement of an asset.
///
/// `source = None` is issuance, `destination = None` is annihilation; at most
/// one of the two may be absent. Operations tied to a transaction are unique
/// per `(transaction, hop)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: ObjectId,
    /// The asset issuer (owner of the canonical row).
    pub owner: Address,
    pub asset: AssetName,
    pub source: Option<Address>,
    pub destination: Option<Address>,
    pub amount: Amount,
    pub status: OpStatus,
    /// Transaction id, absent for standalone operations.
    pub transaction: Option<ObjectId>,
    pub hop: Option<u8>,
    pub propagation: PropagationType,
    pub created: Timestamp,
}

/// Trait for operation storage operations.
pub trait OperationStore {
    fn get_operation_by_id(&self, id: &ObjectId) -> Result<Option<OperationRecord>, StoreError>;
    /// Look up by the (transaction, hop) unique index.
    fn get_operation(&self, transaction: &ObjectId, hop: u8)
        -> Result<Option<OperationRecord>, StoreError>;
    fn list_operations(&self, transaction: &ObjectId) -> Result<Vec<OperationRecord>, StoreError>;
    fn put_operation(&mut self, record: &OperationRecord) -> Result<(), StoreError>;
}
