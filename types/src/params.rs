//! Mint protocol parameters.

use serde::{Deserialize, Serialize};

/// Default transaction expiry: one hour.
pub const DEFAULT_TRANSACTION_EXPIRY_MS: u64 = 60 * 60 * 1000;

/// Maximum retries for propagation tasks (deadline doubles each retry).
pub const PROPAGATION_MAX_RETRIES: u32 = 18;

/// Maximum retries for transaction-expiry tasks.
pub const EXPIRY_MAX_RETRIES: u32 = 8;

/// Maximum number of offers in a transaction path.
pub const MAX_PATH_LENGTH: usize = 16;

/// Tunable parameters for a mint instance.
///
/// Constructed once at startup and passed by reference through the service
/// objects, so several mint instances with different parameters can coexist
/// in one process.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MintParams {
    /// Milliseconds after creation at which an unsettled transaction is
    /// driven to cancellation.
    pub transaction_expiry_ms: u64,
    pub propagation_max_retries: u32,
    pub expiry_max_retries: u32,
}

impl Default for MintParams {
    fn default() -> Self {
        Self {
            transaction_expiry_ms: DEFAULT_TRANSACTION_EXPIRY_MS,
            propagation_max_retries: PROPAGATION_MAX_RETRIES,
            expiry_max_retries: EXPIRY_MAX_RETRIES,
        }
    }
}
