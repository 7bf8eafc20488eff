//! User address type: `user@mint-host`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{codes, UserError};

/// An address identifies a user on a specific mint: `user@mint-host`.
///
/// The host part may carry a port (`alice@127.0.0.1:2406`), so the address is
/// split at the first `@`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    user: String,
    host: String,
}

impl Address {
    /// Parse a `user@host` address.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let (user, host) = raw
            .split_once('@')
            .ok_or_else(|| UserError::new(codes::ADDRESS_INVALID, format!("invalid address: {raw}")))?;
        if user.is_empty() || host.is_empty() || user.contains(['[', ']']) || host.contains(['[', ']'])
        {
            return Err(UserError::new(
                codes::ADDRESS_INVALID,
                format!("invalid address: {raw}"),
            ));
        }
        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The mint host this user lives on.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

impl FromStr for Address {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = UserError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let a = Address::parse("alice@mint.example.com").unwrap();
        assert_eq!(a.user(), "alice");
        assert_eq!(a.host(), "mint.example.com");
        assert_eq!(a.to_string(), "alice@mint.example.com");
    }

    #[test]
    fn parse_host_with_port() {
        let a = Address::parse("bob@127.0.0.1:2406").unwrap();
        assert_eq!(a.host(), "127.0.0.1:2406");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Address::parse("alice").is_err());
        assert!(Address::parse("@mint.example.com").is_err());
        assert!(Address::parse("alice@").is_err());
        assert!(Address::parse("al[ice@mint.example.com").is_err());
    }
}
