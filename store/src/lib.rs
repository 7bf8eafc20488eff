//! Abstract storage traits for the scrip mint.
//!
//! Every storage backend (SQL, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits. Mutations go
//! through a [`StoreTxn`] obtained from [`MintStore::begin`]; the backend is
//! responsible for serializable isolation between concurrent transactions.

pub mod asset;
pub mod balance;
pub mod crossing;
pub mod error;
pub mod offer;
pub mod operation;
pub mod task;
pub mod transaction;

pub use asset::{AssetRecord, AssetStore};
pub use balance::{BalanceRecord, BalanceStore};
pub use crossing::{CrossingRecord, CrossingStore};
pub use error::StoreError;
pub use offer::{OfferRecord, OfferStore};
pub use operation::{OperationRecord, OperationStore};
pub use task::{TaskRecord, TaskStore};
pub use transaction::{TransactionRecord, TransactionStore};

/// A scoped storage transaction over every entity store.
///
/// Dropping a transaction without calling [`StoreTxn::commit`] rolls it back.
pub trait StoreTxn:
    AssetStore + BalanceStore + OfferStore + TransactionStore + OperationStore + CrossingStore + TaskStore + Send
{
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Handle to a mint's database.
pub trait MintStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError>;
}
