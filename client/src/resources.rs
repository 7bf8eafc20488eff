//! Wire resources exchanged between mints.
//!
//! Resources mirror the persisted records. A transaction resource embeds the
//! operations and crossings the advertising mint holds for it, which is what
//! plan checking and the neighbor-consensus rules inspect.

use serde::{Deserialize, Serialize};

use scrip_store::{
    AssetRecord, BalanceRecord, CrossingRecord, OfferRecord, OperationRecord, TransactionRecord,
};
use scrip_types::{
    Address, Amount, AssetName, ObjectId, OfferStatus, OpStatus, PropagationType, Timestamp,
    TxStatus,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetResource {
    pub id: ObjectId,
    pub owner: Address,
    pub code: String,
    pub scale: u8,
    pub created: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceResource {
    pub id: ObjectId,
    pub owner: Address,
    pub asset: AssetName,
    pub holder: Address,
    pub value: Amount,
    pub created: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OfferResource {
    pub id: ObjectId,
    pub owner: Address,
    pub base_asset: AssetName,
    pub quote_asset: AssetName,
    pub base_price: Amount,
    pub quote_price: Amount,
    pub amount: Amount,
    pub status: OfferStatus,
    pub remainder: Amount,
    pub created: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationResource {
    pub id: ObjectId,
    pub owner: Address,
    pub asset: AssetName,
    pub source: Option<Address>,
    pub destination: Option<Address>,
    pub amount: Amount,
    pub status: OpStatus,
    pub transaction: Option<ObjectId>,
    pub hop: Option<u8>,
    pub created: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossingResource {
    pub id: ObjectId,
    pub owner: Address,
    pub offer: ObjectId,
    pub amount: Amount,
    pub status: OpStatus,
    pub transaction: ObjectId,
    pub hop: u8,
    pub created: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionResource {
    pub id: ObjectId,
    pub owner: Address,
    pub base_asset: AssetName,
    pub quote_asset: AssetName,
    pub amount: Amount,
    pub destination: Address,
    pub path: Vec<ObjectId>,
    pub status: TxStatus,
    pub lock: String,
    /// Present only once settlement revealed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// The advertising mint's operations for this transaction, by hop.
    #[serde(default)]
    pub operations: Vec<OperationResource>,
    /// The advertising mint's crossings for this transaction, by hop.
    #[serde(default)]
    pub crossings: Vec<CrossingResource>,
    pub created: Timestamp,
}

// ── Record → resource ────────────────────────────────────────────────────

impl From<&AssetRecord> for AssetResource {
    fn from(r: &AssetRecord) -> Self {
        Self {
            id: r.id.clone(),
            owner: r.owner.clone(),
            code: r.code.clone(),
            scale: r.scale,
            created: r.created,
        }
    }
}

impl From<&BalanceRecord> for BalanceResource {
    fn from(r: &BalanceRecord) -> Self {
        Self {
            id: r.id.clone(),
            owner: r.owner.clone(),
            asset: r.asset.clone(),
            holder: r.holder.clone(),
            value: r.value,
            created: r.created,
        }
    }
}

impl From<&OfferRecord> for OfferResource {
    fn from(r: &OfferRecord) -> Self {
        Self {
            id: r.id.clone(),
            owner: r.owner.clone(),
            base_asset: r.base_asset.clone(),
            quote_asset: r.quote_asset.clone(),
            base_price: r.base_price,
            quote_price: r.quote_price,
            amount: r.amount,
            status: r.status,
            remainder: r.remainder,
            created: r.created,
        }
    }
}

impl From<&OperationRecord> for OperationResource {
    fn from(r: &OperationRecord) -> Self {
        Self {
            id: r.id.clone(),
            owner: r.owner.clone(),
            asset: r.asset.clone(),
            source: r.source.clone(),
            destination: r.destination.clone(),
            amount: r.amount,
            status: r.status,
            transaction: r.transaction.clone(),
            hop: r.hop,
            created: r.created,
        }
    }
}

impl From<&CrossingRecord> for CrossingResource {
    fn from(r: &CrossingRecord) -> Self {
        Self {
            id: r.id.clone(),
            owner: r.owner.clone(),
            offer: r.offer.clone(),
            amount: r.amount,
            status: r.status,
            transaction: r.transaction.clone(),
            hop: r.hop,
            created: r.created,
        }
    }
}

// ── Resource → record (shadow copies) ────────────────────────────────────

impl OfferResource {
    /// Materialize as a local record with the given propagation tag.
    pub fn into_record(self, propagation: PropagationType) -> OfferRecord {
        OfferRecord {
            id: self.id,
            owner: self.owner,
            base_asset: self.base_asset,
            quote_asset: self.quote_asset,
            base_price: self.base_price,
            quote_price: self.quote_price,
            amount: self.amount,
            status: self.status,
            remainder: self.remainder,
            propagation,
            created: self.created,
        }
    }
}

impl BalanceResource {
    pub fn into_record(self, propagation: PropagationType) -> BalanceRecord {
        BalanceRecord {
            id: self.id,
            owner: self.owner,
            asset: self.asset,
            holder: self.holder,
            value: self.value,
            propagation,
            created: self.created,
        }
    }
}

impl OperationResource {
    pub fn into_record(self, propagation: PropagationType) -> OperationRecord {
        OperationRecord {
            id: self.id,
            owner: self.owner,
            asset: self.asset,
            source: self.source,
            destination: self.destination,
            amount: self.amount,
            status: self.status,
            transaction: self.transaction,
            hop: self.hop,
            propagation,
            created: self.created,
        }
    }
}

impl TransactionResource {
    /// Materialize the transaction itself (without the embedded per-hop
    /// state, which each mint derives locally) as a shadow record.
    pub fn into_record(self, propagation: PropagationType) -> TransactionRecord {
        TransactionRecord {
            id: self.id,
            owner: self.owner,
            base_asset: self.base_asset,
            quote_asset: self.quote_asset,
            amount: self.amount,
            destination: self.destination,
            path: self.path,
            status: self.status,
            lock: self.lock,
            secret: self.secret,
            propagation,
            created: self.created,
        }
    }

    /// The advertised operation at `hop`, if any.
    pub fn operation_at(&self, hop: u8) -> Option<&OperationResource> {
        self.operations.iter().find(|o| o.hop == Some(hop))
    }

    /// The advertised crossing at `hop`, if any.
    pub fn crossing_at(&self, hop: u8) -> Option<&CrossingResource> {
        self.crossings.iter().find(|c| c.hop == hop)
    }
}
