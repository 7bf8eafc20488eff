//! Status enums for offers, transactions, operations, crossings and tasks.
//!
//! Status transitions are monotone: terminal states (`Closed`, `Settled`,
//! `Canceled`, `Succeeded`, `Failed`) never change again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether this mint is authoritative for an entity or merely caches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationType {
    /// This mint is the source of truth.
    Canonical,
    /// Read-only shadow copy of another mint's canonical state.
    Propagated,
}

/// The lifecycle of a standing offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    /// Remainder hit zero; reopens to `Active` when a crossing cancels.
    Consumed,
    /// Closed by its owner. Terminal.
    Closed,
}

impl OfferStatus {
    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        match self {
            Self::Active => matches!(next, Self::Consumed | Self::Closed),
            Self::Consumed => matches!(next, Self::Active | Self::Closed),
            Self::Closed => false,
        }
    }
}

/// The lifecycle of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Reserved,
    Settled,
    Canceled,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Canceled)
    }

    pub fn can_transition_to(self, next: TxStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Reserved | Self::Settled | Self::Canceled),
            Self::Reserved => matches!(next, Self::Settled | Self::Canceled),
            Self::Settled | Self::Canceled => false,
        }
    }
}

/// The lifecycle of an operation or crossing on a single hop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Reserved,
    Settled,
    Canceled,
}

/// The lifecycle of a persisted retry task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Reserved => "reserved",
            Self::Settled => "settled",
            Self::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for OpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reserved => "reserved",
            Self::Settled => "settled",
            Self::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}
