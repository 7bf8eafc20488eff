//! Object id type: `owner@mint-host[token]`.
//!
//! Every persisted entity is identified by its owner address plus a random
//! token of the form `<prefix>_<hex>`. The owner's host is the entity's
//! canonical mint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::{codes, UserError};

/// Token prefixes per entity kind.
pub mod prefix {
    pub const ASSET: &str = "asset";
    pub const OFFER: &str = "offer";
    pub const BALANCE: &str = "balance";
    pub const TRANSACTION: &str = "transaction";
    pub const OPERATION: &str = "operation";
    pub const CROSSING: &str = "crossing";
    pub const TASK: &str = "task";
}

/// Canonical identity of a persisted entity: `owner@mint-host[token]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId {
    owner: Address,
    token: String,
}

impl ObjectId {
    pub fn new(owner: Address, token: impl Into<String>) -> Self {
        Self {
            owner,
            token: token.into(),
        }
    }

    /// Parse an `owner@host[token]` id.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let invalid = || UserError::new(codes::ID_INVALID, format!("invalid id: {raw}"));
        let raw = raw.strip_suffix(']').ok_or_else(invalid)?;
        let (owner, token) = raw.split_once('[').ok_or_else(invalid)?;
        if token.is_empty() || token.contains('[') {
            return Err(invalid());
        }
        let owner = Address::parse(owner).map_err(|_| invalid())?;
        Ok(Self {
            owner,
            token: token.to_string(),
        })
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// The entity's canonical mint host.
    pub fn host(&self) -> &str {
        self.owner.host()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the token carries the given kind prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.token
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('_'))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.owner, self.token)
    }
}

impl FromStr for ObjectId {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = UserError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}
