//! Settlement hash lock.
//!
//! `lock = hex(scrypt(secret, token, N=2^14, r=8, p=1, len=64))`. The token
//! acts as the salt, so a secret reused across transactions still yields
//! distinct locks.

use scrypt::{scrypt, Params};

use crate::CryptoError;

/// scrypt cost: N = 2^14, r = 8, p = 1, 64-byte output.
const LOG_N: u8 = 14;
const R: u32 = 8;
const P: u32 = 1;
const LEN: usize = 64;

/// Derive the hex-encoded lock for a secret under the given token.
pub fn compute_lock(secret: &str, token: &str) -> Result<String, CryptoError> {
    let params = Params::new(LOG_N, R, P, LEN).map_err(|e| CryptoError::Derivation(e.to_string()))?;
    let mut out = [0u8; LEN];
    scrypt(secret.as_bytes(), token.as_bytes(), &params, &mut out)
        .map_err(|e| CryptoError::Derivation(e.to_string()))?;
    Ok(hex::encode(out))
}

/// Whether `secret` opens the lock derived under `token`.
pub fn check_lock(secret: &str, token: &str, lock: &str) -> Result<bool, CryptoError> {
    Ok(compute_lock(secret, token)? == lock)
}
