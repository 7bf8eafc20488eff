//! Remote mint client.
//!
//! Mints talk to each other over plain HTTP: retrieving canonical resources,
//! pushing propagation notifications and driving the create/settle/cancel
//! chain. [`MintClient`] is the seam — the node wires the reqwest-backed
//! [`HttpMintClient`], tests wire an in-process router.

pub mod error;
pub mod http;
pub mod resources;

pub use error::ClientError;
pub use http::HttpMintClient;
pub use resources::{
    AssetResource, BalanceResource, CrossingResource, OfferResource, OperationResource,
    TransactionResource,
};

use async_trait::async_trait;
use scrip_types::ObjectId;

/// Client interface to remote mints.
///
/// `retrieve_*` fetch a resource from its canonical mint (or, for
/// transactions, from an explicitly named mint so neighbor state can be
/// inspected). `propagate_*` notify a mint that it should refresh its shadow
/// copy. The `*_transaction` calls drive the settlement protocol, carrying
/// the hop index the receiving mint must act on.
#[async_trait]
pub trait MintClient: Send + Sync {
    async fn retrieve_offer(&self, id: &ObjectId) -> Result<OfferResource, ClientError>;

    async fn retrieve_operation(&self, id: &ObjectId) -> Result<OperationResource, ClientError>;

    async fn retrieve_balance(&self, id: &ObjectId) -> Result<BalanceResource, ClientError>;

    /// Fetch a transaction as advertised by `mint`, defaulting to the
    /// transaction's canonical mint.
    async fn retrieve_transaction(
        &self,
        id: &ObjectId,
        mint: Option<&str>,
    ) -> Result<TransactionResource, ClientError>;

    async fn propagate_offer(&self, id: &ObjectId, mint: &str)
        -> Result<OfferResource, ClientError>;

    async fn propagate_operation(
        &self,
        id: &ObjectId,
        mint: &str,
    ) -> Result<OperationResource, ClientError>;

    async fn propagate_balance(
        &self,
        id: &ObjectId,
        mint: &str,
    ) -> Result<BalanceResource, ClientError>;

    async fn create_transaction(
        &self,
        id: &ObjectId,
        hop: u8,
        mint: &str,
    ) -> Result<TransactionResource, ClientError>;

    async fn settle_transaction(
        &self,
        id: &ObjectId,
        hop: u8,
        secret: &str,
        mint: &str,
    ) -> Result<TransactionResource, ClientError>;

    async fn cancel_transaction(
        &self,
        id: &ObjectId,
        hop: u8,
        mint: &str,
    ) -> Result<TransactionResource, ClientError>;
}
