//! Ledger error types.

use scrip_store::StoreError;
use scrip_types::{Amount, UserError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Debit against a balance that cannot cover it. User-level.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    /// Crossing amount exceeds the offer's remainder. User-level.
    #[error("insufficient remainder on offer {offer}: need {needed}, have {available}")]
    InsufficientRemainder {
        offer: String,
        needed: Amount,
        available: Amount,
    },

    /// Balance or remainder arithmetic left the `[0, 2^128)` range.
    /// Data-integrity error, never retried.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error("offer is not active: {0}")]
    OfferNotActive(String),

    #[error("offer not found: {0}")]
    OfferNotFound(String),

    #[error("balance not found: {asset} held by {holder}")]
    BalanceNotFound { asset: String, holder: String },

    /// A structural invariant was violated (issuer balance of own asset,
    /// offer on a foreign asset, ...). Data-integrity error.
    #[error("ledger invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Whether this error is a user error (4xx) rather than an internal one.
    pub fn is_user(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::InsufficientRemainder { .. }
                | Self::OfferNotActive(_)
                | Self::OfferNotFound(_)
                | Self::User(_)
        )
    }
}
