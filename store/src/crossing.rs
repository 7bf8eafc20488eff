//! Crossing storage trait.

use scrip_types::{Address, Amount, ObjectId, OpStatus, PropagationType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// The consumption of part of an offer's remainder by a transaction.
/// Unique per `(transaction, hop)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossingRecord {
    pub id: ObjectId,
    /// The offer owner (owner of the canonical row).
    pub owner: Address,
    pub offer: ObjectId,
    pub amount: Amount,
    pub status: OpStatus,
    pub transaction: ObjectId,
    pub hop: u8,
    pub propagation: PropagationType,
    pub created: Timestamp,
}

/// Trait for crossing storage operations.
pub trait CrossingStore {
    /// Look up by the (transaction, hop) unique index.
    fn get_crossing(&self, transaction: &ObjectId, hop: u8)
        -> Result<Option<CrossingRecord>, StoreError>;
    fn list_crossings(&self, transaction: &ObjectId) -> Result<Vec<CrossingRecord>, StoreError>;
    fn put_crossing(&mut self, record: &CrossingRecord) -> Result<(), StoreError>;
}
