//! Cryptographic primitives for the scrip mint.
//!
//! The settlement protocol binds a transaction to a hash lock: the lock is
//! `scrypt(secret, token)` where `token` is the random token of the
//! transaction id and `secret` stays with the canonical mint until
//! settlement. This crate also generates the random tokens and secrets.

pub mod lock;
pub mod token;

pub use lock::{check_lock, compute_lock};
pub use token::{new_secret, new_token};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("scrypt key derivation failed: {0}")]
    Derivation(String),
}
