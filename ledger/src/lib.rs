//! Ledger primitives for the scrip mint.
//!
//! Invariant-preserving mutations of balances and offers, always applied
//! inside a caller-provided storage transaction. Sign and overflow
//! violations are data-integrity errors — they are surfaced as internal
//! errors and never retried.

pub mod balance;
pub mod error;
pub mod offer;

pub use balance::{credit_balance, debit_balance};
pub use error::LedgerError;
pub use offer::{consume_offer, create_offer, reopen_offer};

use scrip_crypto::new_token;
use scrip_store::{AssetRecord, AssetStore, StoreTxn};
use scrip_types::{id::prefix, Address, ObjectId, PropagationType, Timestamp, UserError};

/// Register a new asset issued by `owner` on this mint.
///
/// Assets are unique per (owner, code, scale) and immutable after creation.
pub fn register_asset(
    txn: &mut dyn StoreTxn,
    owner: &Address,
    code: &str,
    scale: u8,
) -> Result<AssetRecord, LedgerError> {
    let name = scrip_types::AssetName::new(owner.clone(), code, scale)
        .map_err(LedgerError::User)?;
    if txn.get_asset(&name)?.is_some() {
        return Err(LedgerError::User(UserError::new(
            "asset_already_exists",
            format!("asset already exists: {name}"),
        )));
    }
    let record = AssetRecord {
        id: ObjectId::new(owner.clone(), new_token(prefix::ASSET)),
        owner: owner.clone(),
        code: code.to_string(),
        scale,
        propagation: PropagationType::Canonical,
        created: Timestamp::now(),
    };
    txn.put_asset(&record)?;
    Ok(record)
}
