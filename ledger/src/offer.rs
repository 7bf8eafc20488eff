//! Offer mutations.
//!
//! An offer's `remainder` is the crossing capacity still open, denominated
//! in the quote asset. Reservation consumes it; cancellation reopens it.

use scrip_crypto::new_token;
use scrip_store::{OfferRecord, OfferStore, StoreTxn};
use scrip_types::{
    id::prefix, Address, Amount, AssetName, ObjectId, OfferStatus, PropagationType, Timestamp,
    UserError,
};

use crate::LedgerError;

/// Create a standing offer: `owner` sells `base_asset` against `quote_asset`
/// at `base_price/quote_price`, with total crossing capacity `amount`.
pub fn create_offer(
    txn: &mut dyn StoreTxn,
    owner: &Address,
    base_asset: AssetName,
    quote_asset: AssetName,
    base_price: Amount,
    quote_price: Amount,
    amount: Amount,
) -> Result<OfferRecord, LedgerError> {
    if base_asset.issuer() != owner {
        return Err(LedgerError::Invariant(format!(
            "offer owner {owner} does not issue base asset {base_asset}"
        )));
    }
    if base_price.is_zero() || quote_price.is_zero() {
        return Err(LedgerError::User(UserError::new(
            scrip_types::codes::AMOUNT_INVALID,
            "offer prices must be positive",
        )));
    }
    if amount.is_zero() {
        return Err(LedgerError::User(UserError::new(
            scrip_types::codes::AMOUNT_INVALID,
            "offer amount must be positive",
        )));
    }
    let record = OfferRecord {
        id: ObjectId::new(owner.clone(), new_token(prefix::OFFER)),
        owner: owner.clone(),
        base_asset,
        quote_asset,
        base_price,
        quote_price,
        amount,
        status: OfferStatus::Active,
        remainder: amount,
        propagation: PropagationType::Canonical,
        created: Timestamp::now(),
    };
    txn.put_offer(&record)?;
    Ok(record)
}

/// Consume `amount` of the offer's remainder for a crossing reservation.
/// Marks the offer `Consumed` when the remainder reaches zero.
pub fn consume_offer(
    txn: &mut dyn StoreTxn,
    id: &ObjectId,
    amount: Amount,
) -> Result<OfferRecord, LedgerError> {
    let mut record = txn
        .get_offer(id)?
        .ok_or_else(|| LedgerError::OfferNotFound(id.to_string()))?;
    if record.status != OfferStatus::Active {
        return Err(LedgerError::OfferNotActive(id.to_string()));
    }
    if amount > record.remainder {
        return Err(LedgerError::InsufficientRemainder {
            offer: id.to_string(),
            needed: amount,
            available: record.remainder,
        });
    }
    record.remainder = record
        .remainder
        .checked_sub(amount)
        .expect("remainder bounds checked above");
    if record.remainder.is_zero() {
        record.status = OfferStatus::Consumed;
    }
    txn.put_offer(&record)?;
    Ok(record)
}

/// Reopen `amount` of the offer's remainder after a crossing cancellation.
/// Restores `Active` unless the owner closed the offer in the meantime.
pub fn reopen_offer(
    txn: &mut dyn StoreTxn,
    id: &ObjectId,
    amount: Amount,
) -> Result<OfferRecord, LedgerError> {
    let mut record = txn
        .get_offer(id)?
        .ok_or_else(|| LedgerError::OfferNotFound(id.to_string()))?;
    let reopened = record
        .remainder
        .checked_add(amount)
        .ok_or_else(|| LedgerError::AmountOutOfRange(format!("remainder + {amount} overflows")))?;
    if reopened > record.amount {
        return Err(LedgerError::Invariant(format!(
            "reopened remainder {reopened} exceeds offer amount {}",
            record.amount
        )));
    }
    record.remainder = reopened;
    if record.status == OfferStatus::Consumed {
        record.status = OfferStatus::Active;
    }
    txn.put_offer(&record)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrip_store::MintStore;
    use scrip_store_mem::MemStore;

    fn make_offer(txn: &mut dyn StoreTxn, amount: u128) -> OfferRecord {
        let owner = Address::parse("carol@mint-b.example").unwrap();
        let base = AssetName::parse("carol@mint-b.example:USD.2").unwrap();
        let quote = AssetName::parse("alice@mint-a.example:USD.2").unwrap();
        create_offer(
            txn,
            &owner,
            base,
            quote,
            Amount::new(1),
            Amount::new(1),
            Amount::new(amount),
        )
        .unwrap()
    }

    #[test]
    fn consume_then_reopen_restores_remainder() {
        let store = MemStore::new();
        let mut txn = store.begin().unwrap();
        let offer = make_offer(txn.as_mut(), 100);

        let consumed = consume_offer(txn.as_mut(), &offer.id, Amount::new(40)).unwrap();
        assert_eq!(consumed.remainder, Amount::new(60));
        assert_eq!(consumed.status, OfferStatus::Active);

        let reopened = reopen_offer(txn.as_mut(), &offer.id, Amount::new(40)).unwrap();
        assert_eq!(reopened.remainder, Amount::new(100));
    }

    #[test]
    fn fully_consumed_offer_flips_status_and_back() {
        let store = MemStore::new();
        let mut txn = store.begin().unwrap();
        let offer = make_offer(txn.as_mut(), 10);

        let consumed = consume_offer(txn.as_mut(), &offer.id, Amount::new(10)).unwrap();
        assert_eq!(consumed.status, OfferStatus::Consumed);

        // A consumed offer rejects further crossings.
        let err = consume_offer(txn.as_mut(), &offer.id, Amount::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::OfferNotActive(_)));

        let reopened = reopen_offer(txn.as_mut(), &offer.id, Amount::new(10)).unwrap();
        assert_eq!(reopened.status, OfferStatus::Active);
        assert_eq!(reopened.remainder, Amount::new(10));
    }

    #[test]
    fn consume_beyond_remainder_rejected() {
        let store = MemStore::new();
        let mut txn = store.begin().unwrap();
        let offer = make_offer(txn.as_mut(), 10);

        let err = consume_offer(txn.as_mut(), &offer.id, Amount::new(11)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientRemainder { .. }));
    }

    #[test]
    fn closed_offer_stays_closed_on_reopen() {
        let store = MemStore::new();
        let mut txn = store.begin().unwrap();
        let mut offer = make_offer(txn.as_mut(), 10);

        consume_offer(txn.as_mut(), &offer.id, Amount::new(10)).unwrap();
        offer = txn.get_offer(&offer.id).unwrap().unwrap();
        offer.status = OfferStatus::Closed;
        txn.put_offer(&offer).unwrap();

        let reopened = reopen_offer(txn.as_mut(), &offer.id, Amount::new(10)).unwrap();
        assert_eq!(reopened.status, OfferStatus::Closed);
        assert_eq!(reopened.remainder, Amount::new(10));
    }

    #[test]
    fn offer_must_be_on_own_asset() {
        let store = MemStore::new();
        let mut txn = store.begin().unwrap();
        let owner = Address::parse("carol@mint-b.example").unwrap();
        let foreign = AssetName::parse("alice@mint-a.example:USD.2").unwrap();
        let quote = AssetName::parse("alice@mint-a.example:EUR.2").unwrap();
        let err = create_offer(
            txn.as_mut(),
            &owner,
            foreign,
            quote,
            Amount::new(1),
            Amount::new(1),
            Amount::new(10),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Invariant(_)));
    }
}
