//! User-facing error type shared across crates.
//!
//! Errors fall in two kinds: user errors (4xx, stable machine-readable code
//! plus a human message) and internal errors (5xx, opaque to the caller).
//! Internal errors are modelled per crate with `thiserror`; this module only
//! defines the user-error envelope and the stable codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable error codes carried by 4xx responses.
pub mod codes {
    pub const ADDRESS_INVALID: &str = "address_invalid";
    pub const NOT_AUTHORIZED: &str = "not_authorized";
    pub const ASSET_INVALID: &str = "asset_invalid";
    pub const ID_INVALID: &str = "id_invalid";
    pub const AMOUNT_INVALID: &str = "amount_invalid";
    pub const HOP_INVALID: &str = "hop_invalid";
    pub const SECRET_INVALID: &str = "secret_invalid";
    pub const PLAN_MISMATCH: &str = "plan_mismatch";
    pub const INSUFFICIENT_REMAINDER: &str = "insufficient_remainder";
    pub const INSUFFICIENT_BALANCE: &str = "insufficient_balance";
    pub const TRANSACTION_FAILED: &str = "transaction_failed";
    pub const SETTLEMENT_FAILED: &str = "settlement_failed";
    pub const CANCELLATION_FAILED: &str = "cancellation_failed";
    pub const CANCELLATION_NOT_AUTHORIZED: &str = "cancellation_not_authorized";
    pub const ASSET_NOT_FOUND: &str = "asset_not_found";
    pub const OFFER_NOT_FOUND: &str = "offer_not_found";
    pub const BALANCE_NOT_FOUND: &str = "balance_not_found";
    pub const TRANSACTION_NOT_FOUND: &str = "transaction_not_found";
    pub const OPERATION_NOT_FOUND: &str = "operation_not_found";
}

/// A user error: stable code, human message, suggested HTTP status.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct UserError {
    pub code: String,
    pub message: String,
    #[serde(skip, default = "default_status")]
    pub status: u16,
}

fn default_status() -> u16 {
    400
}

impl UserError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            status: 400,
        }
    }

    pub fn with_status(code: &str, status: u16, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            status,
        }
    }

    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::with_status(code, 404, message)
    }

    /// 402 — the canonical status for failed settlement-protocol requests.
    pub fn payment_required(code: &str, message: impl Into<String>) -> Self {
        Self::with_status(code, 402, message)
    }
}
