//! Balance storage trait.

use scrip_types::{Address, Amount, AssetName, ObjectId, PropagationType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A user's balance of an asset. Unique per (asset, holder); canonical at the
/// asset issuer's mint. The issuer never holds a balance of its own asset —
/// issuance and annihilation take its place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub id: ObjectId,
    /// The asset issuer (owner of the canonical row).
    pub owner: Address,
    pub asset: AssetName,
    pub holder: Address,
    pub value: Amount,
    pub propagation: PropagationType,
    pub created: Timestamp,
}

/// Trait for balance storage operations.
pub trait BalanceStore {
    /// Look up by the (asset, holder) unique index.
    fn get_balance(&self, asset: &AssetName, holder: &Address)
        -> Result<Option<BalanceRecord>, StoreError>;
    fn get_balance_by_id(&self, id: &ObjectId) -> Result<Option<BalanceRecord>, StoreError>;
    fn put_balance(&mut self, record: &BalanceRecord) -> Result<(), StoreError>;
}
