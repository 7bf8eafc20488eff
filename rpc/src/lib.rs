//! HTTP surface of a scrip mint.
//!
//! Routes the cross-mint settlement protocol over plain HTTP. Request
//! authentication is handled by a fronting layer; authenticated routes read
//! the verified caller identity from the `x-scrip-user` header that layer
//! injects, while the propagated variants of the same endpoints skip
//! authentication and carry a `hop` instead.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, serve, RpcState};
