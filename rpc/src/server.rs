//! Axum router and server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use scrip_settlement::Settlement;

use crate::handlers;
use crate::RpcError;

/// Shared state for the HTTP surface.
#[derive(Clone)]
pub struct RpcState {
    pub settlement: Arc<Settlement>,
}

/// Create the full router with all mint routes.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/transactions", post(handlers::create_transaction))
        .route(
            "/transactions/:id",
            post(handlers::propagate_transaction).get(handlers::get_transaction),
        )
        .route("/transactions/:id/settle", post(handlers::settle_transaction))
        .route("/transactions/:id/cancel", post(handlers::cancel_transaction))
        .route(
            "/offers/:id",
            get(handlers::get_offer).post(handlers::receive_offer),
        )
        .route(
            "/operations/:id",
            get(handlers::get_operation).post(handlers::receive_operation),
        )
        .route(
            "/balances/:id",
            get(handlers::get_balance).post(handlers::receive_balance),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: RpcState, port: u16) -> Result<(), RpcError> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| {
            RpcError::Store(scrip_store::StoreError::Backend(format!(
                "cannot bind port {port}: {e}"
            )))
        })?;
    info!(port, "mint RPC listening");
    axum::serve(listener, app).await.map_err(|e| {
        RpcError::Store(scrip_store::StoreError::Backend(format!(
            "server error: {e}"
        )))
    })
}
