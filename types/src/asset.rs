//! Asset name type: `issuer@mint-host:CODE.scale`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::{codes, UserError};

/// Maximum allowed asset scale (decimal exponent).
pub const MAX_ASSET_SCALE: u8 = 24;

/// A fully qualified asset name: `issuer@mint-host:CODE.scale`.
///
/// `CODE` is 1-64 characters in `[A-Z0-9-]`, `scale` is the decimal exponent
/// between the raw unit and the display unit (0-24). The name is split at the
/// last `:` so issuer hosts carrying a port still parse.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetName {
    issuer: Address,
    code: String,
    scale: u8,
}

impl AssetName {
    pub fn new(issuer: Address, code: impl Into<String>, scale: u8) -> Result<Self, UserError> {
        let code = code.into();
        if !is_valid_code(&code) {
            return Err(UserError::new(
                codes::ASSET_INVALID,
                format!("invalid asset code: {code}"),
            ));
        }
        if scale > MAX_ASSET_SCALE {
            return Err(UserError::new(
                codes::ASSET_INVALID,
                format!("invalid asset scale: {scale}"),
            ));
        }
        Ok(Self { issuer, code, scale })
    }

    /// Parse an `issuer@host:CODE.scale` name.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let invalid = || UserError::new(codes::ASSET_INVALID, format!("invalid asset name: {raw}"));
        let (issuer, code_scale) = raw.rsplit_once(':').ok_or_else(invalid)?;
        let (code, scale) = code_scale.rsplit_once('.').ok_or_else(invalid)?;
        let scale: u8 = scale.parse().map_err(|_| invalid())?;
        let issuer = Address::parse(issuer).map_err(|_| invalid())?;
        Self::new(issuer, code, scale)
    }

    /// The address of the issuing user; the issuer's host is the asset's
    /// canonical mint.
    pub fn issuer(&self) -> &Address {
        &self.issuer
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }
}

fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 64
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.issuer, self.code, self.scale)
    }
}

impl FromStr for AssetName {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssetName {
    type Error = UserError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AssetName> for String {
    fn from(a: AssetName) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let a = AssetName::parse("alice@mint.example.com:USD.2").unwrap();
        assert_eq!(a.issuer().to_string(), "alice@mint.example.com");
        assert_eq!(a.code(), "USD");
        assert_eq!(a.scale(), 2);
        assert_eq!(a.to_string(), "alice@mint.example.com:USD.2");
    }

    #[test]
    fn parse_issuer_host_with_port() {
        let a = AssetName::parse("bob@127.0.0.1:2407:EUR.0").unwrap();
        assert_eq!(a.issuer().host(), "127.0.0.1:2407");
        assert_eq!(a.code(), "EUR");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(AssetName::parse("alice@mint.example.com:usd.2").is_err());
        assert!(AssetName::parse("alice@mint.example.com:USD").is_err());
        assert!(AssetName::parse("alice@mint.example.com:USD.25").is_err());
        assert!(AssetName::parse("USD.2").is_err());
    }
}
