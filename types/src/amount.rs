//! Asset amount type.
//!
//! Amounts are non-negative integers in the smallest unit of an asset,
//! represented as `u128` to avoid floating-point errors. The protocol bound
//! is `0 <= amount < 2^128`, which is exactly the `u128` range.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An asset amount in raw units (u128).
///
/// Serialized as a decimal string — JSON numbers do not cover the u128
/// range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// `ceil(self * numerator / denominator)` — any nonzero division
    /// remainder rounds the result up by one unit.
    ///
    /// Returns `None` if the intermediate product overflows u128 or the
    /// denominator is zero.
    pub fn checked_mul_div_ceil(self, numerator: Amount, denominator: Amount) -> Option<Self> {
        if denominator.0 == 0 {
            return None;
        }
        let product = self.0.checked_mul(numerator.0)?;
        let quotient = product / denominator.0;
        let remainder = product % denominator.0;
        if remainder == 0 {
            Some(Self(quotient))
        } else {
            quotient.checked_add(1).map(Self)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl FromStr for Amount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u128>().map(Self)
    }
}

impl TryFrom<String> for Amount {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mul_div_ceil_exact() {
        let a = Amount::new(10);
        assert_eq!(
            a.checked_mul_div_ceil(Amount::new(1), Amount::new(1)),
            Some(Amount::new(10))
        );
        assert_eq!(
            a.checked_mul_div_ceil(Amount::new(2), Amount::new(5)),
            Some(Amount::new(4))
        );
    }

    #[test]
    fn mul_div_ceil_rounds_up() {
        // 10 * 1 / 3 = 3.33.. -> 4
        assert_eq!(
            Amount::new(10).checked_mul_div_ceil(Amount::new(1), Amount::new(3)),
            Some(Amount::new(4))
        );
        // 7 * 3 / 2 = 10.5 -> 11
        assert_eq!(
            Amount::new(7).checked_mul_div_ceil(Amount::new(3), Amount::new(2)),
            Some(Amount::new(11))
        );
    }

    #[test]
    fn mul_div_ceil_overflow_and_zero_denominator() {
        assert_eq!(
            Amount::new(u128::MAX).checked_mul_div_ceil(Amount::new(2), Amount::new(1)),
            None
        );
        assert_eq!(
            Amount::new(1).checked_mul_div_ceil(Amount::new(1), Amount::ZERO),
            None
        );
    }

    proptest! {
        #[test]
        fn mul_div_ceil_never_undershoots(a in 0u128..1u128 << 64, n in 1u128..1u128 << 16, d in 1u128..1u128 << 16) {
            let got = Amount::new(a)
                .checked_mul_div_ceil(Amount::new(n), Amount::new(d))
                .unwrap()
                .raw();
            // got is the least integer >= a*n/d
            prop_assert!(got * d >= a * n);
            prop_assert!((got.saturating_sub(1)) * d < a * n || got == 0);
        }
    }
}
