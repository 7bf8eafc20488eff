//! Asset storage trait.

use scrip_types::{Address, AssetName, ObjectId, PropagationType, Timestamp, UserError};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// An issued asset. Immutable after creation; unique per (owner, code, scale).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: ObjectId,
    /// Issuing user; the issuer's host is the asset's canonical mint.
    pub owner: Address,
    pub code: String,
    pub scale: u8,
    pub propagation: PropagationType,
    pub created: Timestamp,
}

impl AssetRecord {
    /// The fully qualified name `issuer@host:CODE.scale`.
    pub fn name(&self) -> Result<AssetName, UserError> {
        AssetName::new(self.owner.clone(), self.code.clone(), self.scale)
    }
}

/// Trait for asset storage operations.
pub trait AssetStore {
    fn get_asset(&self, name: &AssetName) -> Result<Option<AssetRecord>, StoreError>;
    fn put_asset(&mut self, record: &AssetRecord) -> Result<(), StoreError>;
}
