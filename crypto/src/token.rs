//! Random tokens and secrets.

use rand::RngCore;

/// Generate a fresh entity token: `<prefix>_<16 hex chars>`.
pub fn new_token(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}_{}", prefix, hex::encode(bytes))
}

/// Generate a fresh 32-hex-char settlement secret.
pub fn new_secret() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shape() {
        let t = new_token("offer");
        assert!(t.starts_with("offer_"));
        assert_eq!(t.len(), "offer_".len() + 16);
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(new_token("task"), new_token("task"));
        assert_ne!(new_secret(), new_secret());
    }
}
