//! Offer storage trait.

use scrip_types::{Address, Amount, AssetName, ObjectId, OfferStatus, PropagationType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A standing, partially fillable exchange offer.
///
/// Offers are asks: the owner sells `base_asset` (which it issues) against
/// `quote_asset` at the fixed `base_price/quote_price` ratio. `amount` and
/// `remainder` are denominated in the quote asset — the remainder is what
/// crossings can still pay into the offer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OfferRecord {
    pub id: ObjectId,
    pub owner: Address,
    pub base_asset: AssetName,
    pub quote_asset: AssetName,
    pub base_price: Amount,
    pub quote_price: Amount,
    pub amount: Amount,
    pub status: OfferStatus,
    pub remainder: Amount,
    pub propagation: PropagationType,
    pub created: Timestamp,
}

/// Trait for offer storage operations.
pub trait OfferStore {
    fn get_offer(&self, id: &ObjectId) -> Result<Option<OfferRecord>, StoreError>;
    fn put_offer(&mut self, record: &OfferRecord) -> Result<(), StoreError>;
}
