//! Mint configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;

use scrip_types::MintParams;

use crate::NodeError;

/// Configuration for a scrip mint.
///
/// Can be loaded from a TOML file via [`MintConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MintConfig {
    /// Public host other mints use to reach this one, including the port
    /// when non-standard (`mint.example.com`, `127.0.0.1:2406`).
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether mint-to-mint calls use HTTPS. Disable for development
    /// deployments only.
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Milliseconds after which an unsettled transaction is expired.
    #[serde(default = "default_expiry_ms")]
    pub transaction_expiry_ms: u64,

    /// Number of scheduler worker loops.
    #[serde(default = "default_workers")]
    pub scheduler_workers: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_port() -> u16 {
    2406
}

fn default_true() -> bool {
    true
}

fn default_expiry_ms() -> u64 {
    scrip_types::params::DEFAULT_TRANSACTION_EXPIRY_MS
}

fn default_workers() -> usize {
    2
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MintConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| NodeError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn params(&self) -> MintParams {
        MintParams {
            transaction_expiry_ms: self.transaction_expiry_ms,
            ..MintParams::default()
        }
    }
}
