//! Balance mutations.
//!
//! Balances are canonical at the asset issuer's mint and unique per
//! (asset, holder). The issuer never holds a balance of its own asset:
//! issuance and annihilation replace the balance row, so callers skip the
//! credit/debit when the party is the issuer.

use scrip_crypto::new_token;
use scrip_store::{BalanceRecord, BalanceStore, StoreTxn};
use scrip_types::{id::prefix, Address, Amount, AssetName, ObjectId, PropagationType, Timestamp};

use crate::LedgerError;

/// Credit `amount` to `holder`'s balance of `asset`, creating the balance
/// row on first credit.
pub fn credit_balance(
    txn: &mut dyn StoreTxn,
    asset: &AssetName,
    holder: &Address,
    amount: Amount,
) -> Result<BalanceRecord, LedgerError> {
    if holder == asset.issuer() {
        return Err(LedgerError::Invariant(format!(
            "issuer {holder} cannot hold a balance of its own asset {asset}"
        )));
    }
    let record = match txn.get_balance(asset, holder)? {
        Some(mut record) => {
            record.value = record
                .value
                .checked_add(amount)
                .ok_or_else(|| {
                    LedgerError::AmountOutOfRange(format!(
                        "balance {} + {} overflows",
                        record.value, amount
                    ))
                })?;
            record
        }
        None => BalanceRecord {
            id: ObjectId::new(asset.issuer().clone(), new_token(prefix::BALANCE)),
            owner: asset.issuer().clone(),
            asset: asset.clone(),
            holder: holder.clone(),
            value: amount,
            propagation: PropagationType::Canonical,
            created: Timestamp::now(),
        },
    };
    txn.put_balance(&record)?;
    Ok(record)
}

/// Debit `amount` from `holder`'s balance of `asset`.
pub fn debit_balance(
    txn: &mut dyn StoreTxn,
    asset: &AssetName,
    holder: &Address,
    amount: Amount,
) -> Result<BalanceRecord, LedgerError> {
    if holder == asset.issuer() {
        return Err(LedgerError::Invariant(format!(
            "issuer {holder} cannot hold a balance of its own asset {asset}"
        )));
    }
    let mut record = txn
        .get_balance(asset, holder)?
        .ok_or_else(|| LedgerError::BalanceNotFound {
            asset: asset.to_string(),
            holder: holder.to_string(),
        })?;
    record.value = record
        .value
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientBalance {
            needed: amount,
            available: record.value,
        })?;
    txn.put_balance(&record)?;
    Ok(record)
}
