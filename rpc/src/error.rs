//! RPC error mapping.
//!
//! User errors become 4xx with a stable `{code, message}` envelope; internal
//! errors are opaque 500s, logged with their cause.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use scrip_settlement::SettlementError;
use scrip_store::StoreError;
use scrip_types::UserError;

/// The wire error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            RpcError::User(u) => (u.status, u.code.clone(), u.message.clone()),
            RpcError::Settlement(e) => match e.http_parts() {
                Some((status, code, message)) => (status, code.to_string(), message),
                None => {
                    error!(error = %e, "internal settlement error");
                    internal()
                }
            },
            RpcError::Store(e) => {
                error!(error = %e, "internal storage error");
                internal()
            }
        };
        let status =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

fn internal() -> (u16, String, String) {
    (
        500,
        "internal_error".to_string(),
        "internal server error".to_string(),
    )
}
