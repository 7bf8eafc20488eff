//! Settlement error types.
//!
//! User errors carry a stable code and a suggested HTTP status; everything
//! else is internal (opaque 500, always logged with its cause).

use scrip_client::ClientError;
use scrip_crypto::CryptoError;
use scrip_ledger::LedgerError;
use scrip_store::StoreError;
use scrip_types::{codes, UserError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    User(#[from] UserError),

    /// A remote mint call failed during the forward path of a request.
    #[error("remote mint call failed: {0}")]
    Client(#[from] ClientError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger integrity error: {0}")]
    Ledger(LedgerError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    pub fn plan_mismatch(message: impl Into<String>) -> Self {
        Self::User(UserError::payment_required(codes::PLAN_MISMATCH, message))
    }

    pub fn transaction_failed(message: impl Into<String>) -> Self {
        Self::User(UserError::payment_required(
            codes::TRANSACTION_FAILED,
            message,
        ))
    }

    pub fn settlement_failed(message: impl Into<String>) -> Self {
        Self::User(UserError::payment_required(
            codes::SETTLEMENT_FAILED,
            message,
        ))
    }

    pub fn cancellation_not_authorized(message: impl Into<String>) -> Self {
        Self::User(UserError::payment_required(
            codes::CANCELLATION_NOT_AUTHORIZED,
            message,
        ))
    }

    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::User(UserError::not_found(code, message))
    }

    pub fn hop_invalid(message: impl Into<String>) -> Self {
        Self::User(UserError::new(codes::HOP_INVALID, message))
    }

    pub fn amount_invalid(message: impl Into<String>) -> Self {
        Self::User(UserError::new(codes::AMOUNT_INVALID, message))
    }

    /// The user-error view, if any: `(status, code, message)`.
    /// Remote-call failures surface as 402 `transaction_failed`; everything
    /// without a user-error view is an internal 500.
    pub fn http_parts(&self) -> Option<(u16, &str, String)> {
        match self {
            Self::User(u) => Some((u.status, u.code.as_str(), u.message.clone())),
            Self::Client(e) => Some((402, codes::TRANSACTION_FAILED, e.to_string())),
            Self::Ledger(_) | Self::Store(_) | Self::Crypto(_) | Self::Internal(_) => None,
        }
    }

    /// The stable code, when this is a user error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::User(u) => Some(u.code.as_str()),
            Self::Client(_) => Some(codes::TRANSACTION_FAILED),
            _ => None,
        }
    }
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { needed, available } => {
                Self::User(UserError::payment_required(
                    codes::INSUFFICIENT_BALANCE,
                    format!("insufficient balance: need {needed}, have {available}"),
                ))
            }
            LedgerError::InsufficientRemainder {
                ref offer,
                needed,
                available,
            } => Self::User(UserError::payment_required(
                codes::INSUFFICIENT_REMAINDER,
                format!("offer {offer} cannot absorb {needed}, {available} remaining"),
            )),
            LedgerError::OfferNotActive(ref offer) => Self::User(UserError::payment_required(
                codes::TRANSACTION_FAILED,
                format!("offer {offer} is no longer active"),
            )),
            LedgerError::OfferNotFound(ref offer) => Self::User(UserError::not_found(
                codes::OFFER_NOT_FOUND,
                format!("offer not found: {offer}"),
            )),
            LedgerError::User(u) => Self::User(u),
            // Sign/overflow violations, missing referenced entities and
            // broken invariants are data-integrity errors: internal, never
            // retried.
            other => Self::Ledger(other),
        }
    }
}
