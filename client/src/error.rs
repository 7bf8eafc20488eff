//! Mint client error types.

use scrip_types::codes;
use thiserror::Error;

/// Structured error from a remote mint call.
#[derive(Clone, Debug, Error)]
pub enum ClientError {
    /// Connection failed or the request timed out.
    #[error("mint unreachable: {0}")]
    Unreachable(String),

    /// The remote mint answered with an error envelope.
    #[error("remote mint error [{err_code}] {err_message} (status {status_code})")]
    Remote {
        status_code: u16,
        err_code: String,
        err_message: String,
    },

    /// The remote mint answered with something we could not parse.
    #[error("invalid response from mint: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn remote(status_code: u16, err_code: impl Into<String>, err_message: impl Into<String>) -> Self {
        Self::Remote {
            status_code,
            err_code: err_code.into(),
            err_message: err_message.into(),
        }
    }

    /// Whether the remote mint reported it has no record of the transaction.
    /// The cancellation consensus rule treats this as "safe to cancel".
    pub fn is_transaction_not_found(&self) -> bool {
        matches!(
            self,
            Self::Remote { err_code, .. } if err_code == codes::TRANSACTION_NOT_FOUND
        )
    }
}
