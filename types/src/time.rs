//! Timestamp type used throughout the mint.
//!
//! Timestamps are Unix epoch milliseconds (UTC); transaction expiry and task
//! deadlines are expressed in the same unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis() as u64;
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn plus_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        self.plus_millis(secs.saturating_mul(1000))
    }

    /// Whether this timestamp is due relative to `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.0 <= now.0
    }

    /// Milliseconds until this timestamp, zero if already due.
    pub fn millis_until(&self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_arithmetic() {
        let t = Timestamp::new(1_000);
        assert_eq!(t.plus_secs(2).as_millis(), 3_000);
        assert!(t.is_due(Timestamp::new(1_000)));
        assert!(!t.plus_millis(1).is_due(Timestamp::new(1_000)));
        assert_eq!(t.plus_millis(500).millis_until(t), 500);
    }
}
