//! Request handlers.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::Json;
use serde::Deserialize;

use scrip_client::{
    BalanceResource, OfferResource, OperationResource, TransactionResource,
};
use scrip_store::{BalanceStore, MintStore, OfferStore, OperationStore, StoreTxn};
use scrip_types::{
    codes, Address, Amount, AssetName, ObjectId, PropagationType, UserError,
};

use crate::error::RpcError;
use crate::server::RpcState;

/// The authenticated caller, injected by the fronting auth layer as the
/// `x-scrip-user` header once the challenge/signature check has passed.
pub struct Auth(pub Address);

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-scrip-user")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                UserError::with_status(codes::NOT_AUTHORIZED, 401, "authentication required")
            })?;
        let address = Address::parse(header)?;
        Ok(Auth(address))
    }
}

fn parse_id(raw: &str) -> Result<ObjectId, RpcError> {
    Ok(ObjectId::parse(raw)?)
}

// ── Transactions ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTransactionRequest {
    pub base_asset: AssetName,
    pub quote_asset: AssetName,
    pub amount: Amount,
    pub destination: Address,
    #[serde(default)]
    pub path: Vec<ObjectId>,
}

/// `POST /transactions` — authenticated create at the canonical mint.
pub async fn create_transaction(
    State(state): State<RpcState>,
    Auth(caller): Auth,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<TransactionResource>, RpcError> {
    let resource = state
        .settlement
        .create(
            &caller,
            request.base_asset,
            request.quote_asset,
            request.amount,
            request.destination,
            request.path,
        )
        .await?;
    Ok(Json(resource))
}

#[derive(Deserialize)]
pub struct PropagatedCreateRequest {
    pub hop: u8,
}

/// `POST /transactions/{id}` — propagated create, unauthenticated.
pub async fn propagate_transaction(
    State(state): State<RpcState>,
    Path(id): Path<String>,
    Json(request): Json<PropagatedCreateRequest>,
) -> Result<Json<TransactionResource>, RpcError> {
    let id = parse_id(&id)?;
    Ok(Json(state.settlement.handle_create(&id, request.hop).await?))
}

#[derive(Deserialize, Default)]
pub struct SettleTransactionRequest {
    pub hop: Option<u8>,
    pub secret: Option<String>,
}

/// `POST /transactions/{id}/settle` — owner-initiated at the canonical
/// mint (no hop), or propagated with `hop` + `secret`.
pub async fn settle_transaction(
    State(state): State<RpcState>,
    Path(id): Path<String>,
    auth: Option<Auth>,
    Json(request): Json<SettleTransactionRequest>,
) -> Result<Json<TransactionResource>, RpcError> {
    let id = parse_id(&id)?;
    match request.hop {
        Some(hop) => {
            let secret = request.secret.ok_or_else(|| {
                UserError::new(codes::SECRET_INVALID, "propagated settle requires a secret")
            })?;
            Ok(Json(state.settlement.handle_settle(&id, hop, &secret).await?))
        }
        None => {
            let Auth(caller) = auth.ok_or_else(|| {
                UserError::with_status(codes::NOT_AUTHORIZED, 401, "authentication required")
            })?;
            Ok(Json(state.settlement.settle(&caller, &id).await?))
        }
    }
}

#[derive(Deserialize, Default)]
pub struct CancelTransactionRequest {
    pub hop: Option<u8>,
}

/// `POST /transactions/{id}/cancel` — owner-initiated (no hop) or
/// propagated with `hop`.
pub async fn cancel_transaction(
    State(state): State<RpcState>,
    Path(id): Path<String>,
    auth: Option<Auth>,
    Json(request): Json<CancelTransactionRequest>,
) -> Result<Json<TransactionResource>, RpcError> {
    let id = parse_id(&id)?;
    match request.hop {
        Some(hop) => Ok(Json(state.settlement.handle_cancel(&id, hop).await?)),
        None => {
            let Auth(caller) = auth.ok_or_else(|| {
                UserError::with_status(codes::NOT_AUTHORIZED, 401, "authentication required")
            })?;
            Ok(Json(state.settlement.cancel(&caller, &id).await?))
        }
    }
}

/// `GET /transactions/{id}` — the transaction as this mint advertises it;
/// what plan checking and the neighbor-consensus rules read.
pub async fn get_transaction(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionResource>, RpcError> {
    let id = parse_id(&id)?;
    Ok(Json(state.settlement.retrieve(&id).await?))
}

// ── Resource reads ───────────────────────────────────────────────────────

pub async fn get_offer(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<OfferResource>, RpcError> {
    let id = parse_id(&id)?;
    let txn = state.settlement.store().begin()?;
    txn.get_offer(&id)?
        .map(|r| Json(OfferResource::from(&r)))
        .ok_or_else(|| {
            UserError::not_found(codes::OFFER_NOT_FOUND, format!("offer not found: {id}")).into()
        })
}

pub async fn get_operation(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<OperationResource>, RpcError> {
    let id = parse_id(&id)?;
    let txn = state.settlement.store().begin()?;
    txn.get_operation_by_id(&id)?
        .map(|r| Json(OperationResource::from(&r)))
        .ok_or_else(|| {
            UserError::not_found(
                codes::OPERATION_NOT_FOUND,
                format!("operation not found: {id}"),
            )
            .into()
        })
}

pub async fn get_balance(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResource>, RpcError> {
    let id = parse_id(&id)?;
    let txn = state.settlement.store().begin()?;
    txn.get_balance_by_id(&id)?
        .map(|r| Json(BalanceResource::from(&r)))
        .ok_or_else(|| {
            UserError::not_found(
                codes::BALANCE_NOT_FOUND,
                format!("balance not found: {id}"),
            )
            .into()
        })
}

// ── Propagation receivers ────────────────────────────────────────────────
//
// A propagation notification carries no body: the receiving mint fetches
// the canonical resource itself and upserts its local shadow copy, so a
// malicious notifier cannot plant fabricated state.

/// `POST /offers/{id}`
pub async fn receive_offer(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<OfferResource>, RpcError> {
    let id = parse_id(&id)?;
    let resource = state
        .settlement
        .client()
        .retrieve_offer(&id)
        .await
        .map_err(scrip_settlement::SettlementError::from)?;
    let mut txn = state.settlement.store().begin()?;
    txn.put_offer(&resource.clone().into_record(PropagationType::Propagated))?;
    txn.commit()?;
    Ok(Json(resource))
}

/// `POST /operations/{id}`
pub async fn receive_operation(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<OperationResource>, RpcError> {
    let id = parse_id(&id)?;
    let resource = state
        .settlement
        .client()
        .retrieve_operation(&id)
        .await
        .map_err(scrip_settlement::SettlementError::from)?;
    let mut txn = state.settlement.store().begin()?;
    txn.put_operation(&resource.clone().into_record(PropagationType::Propagated))?;
    txn.commit()?;
    Ok(Json(resource))
}

/// `POST /balances/{id}`
pub async fn receive_balance(
    State(state): State<RpcState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResource>, RpcError> {
    let id = parse_id(&id)?;
    let resource = state
        .settlement
        .client()
        .retrieve_balance(&id)
        .await
        .map_err(scrip_settlement::SettlementError::from)?;
    let mut txn = state.settlement.store().begin()?;
    txn.put_balance(&resource.clone().into_record(PropagationType::Propagated))?;
    txn.commit()?;
    Ok(Json(resource))
}
