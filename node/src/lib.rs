//! Mint node wiring.

pub mod config;
pub mod error;
pub mod logging;
pub mod node;

pub use config::MintConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::MintNode;
