//! reqwest-backed mint client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use scrip_types::ObjectId;

use crate::resources::{
    BalanceResource, OfferResource, OperationResource, TransactionResource,
};
use crate::{ClientError, MintClient};

/// Default timeout for mint-to-mint requests. Propagation chains block on
/// nested calls, so this bounds each hop.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error envelope returned by mints on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// HTTP client for remote mints (reusable connection pool).
pub struct HttpMintClient {
    http_client: reqwest::Client,
    /// `http` for development deployments, `https` in production.
    scheme: String,
}

impl HttpMintClient {
    pub fn new(use_tls: bool) -> Self {
        Self::with_timeout(use_tls, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(use_tls: bool, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            scheme: if use_tls { "https" } else { "http" }.to_string(),
        }
    }

    fn url(&self, mint: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme, mint, path)
    }

    async fn get<T: DeserializeOwned>(&self, mint: &str, path: &str) -> Result<T, ClientError> {
        let url = self.url(mint, path);
        debug!(%url, "mint client GET");
        let response = self.http_client.get(&url).send().await.map_err(map_transport)?;
        parse_response(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        mint: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let url = self.url(mint, path);
        debug!(%url, "mint client POST");
        let mut request = self.http_client.post(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(map_transport)?;
        parse_response(response).await
    }
}

fn map_transport(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        ClientError::Unreachable(format!("connection failed: {e}"))
    } else {
        ClientError::InvalidResponse(e.to_string())
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("malformed resource: {e}")));
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(ClientError::remote(status.as_u16(), body.code, body.message)),
        Err(_) => Err(ClientError::remote(
            status.as_u16(),
            "mint_error",
            format!("HTTP status {status}"),
        )),
    }
}

/// Percent-encode an id for use as a path segment. Ids contain `@`, `:`,
/// `[` and `]`, which are not valid raw path characters.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait]
impl MintClient for HttpMintClient {
    async fn retrieve_offer(&self, id: &ObjectId) -> Result<OfferResource, ClientError> {
        let path = format!("/offers/{}", encode_segment(&id.to_string()));
        self.get(id.host(), &path).await
    }

    async fn retrieve_operation(&self, id: &ObjectId) -> Result<OperationResource, ClientError> {
        let path = format!("/operations/{}", encode_segment(&id.to_string()));
        self.get(id.host(), &path).await
    }

    async fn retrieve_balance(&self, id: &ObjectId) -> Result<BalanceResource, ClientError> {
        let path = format!("/balances/{}", encode_segment(&id.to_string()));
        self.get(id.host(), &path).await
    }

    async fn retrieve_transaction(
        &self,
        id: &ObjectId,
        mint: Option<&str>,
    ) -> Result<TransactionResource, ClientError> {
        let path = format!("/transactions/{}", encode_segment(&id.to_string()));
        self.get(mint.unwrap_or_else(|| id.host()), &path).await
    }

    async fn propagate_offer(
        &self,
        id: &ObjectId,
        mint: &str,
    ) -> Result<OfferResource, ClientError> {
        let path = format!("/offers/{}", encode_segment(&id.to_string()));
        self.post(mint, &path, None).await
    }

    async fn propagate_operation(
        &self,
        id: &ObjectId,
        mint: &str,
    ) -> Result<OperationResource, ClientError> {
        let path = format!("/operations/{}", encode_segment(&id.to_string()));
        self.post(mint, &path, None).await
    }

    async fn propagate_balance(
        &self,
        id: &ObjectId,
        mint: &str,
    ) -> Result<BalanceResource, ClientError> {
        let path = format!("/balances/{}", encode_segment(&id.to_string()));
        self.post(mint, &path, None).await
    }

    async fn create_transaction(
        &self,
        id: &ObjectId,
        hop: u8,
        mint: &str,
    ) -> Result<TransactionResource, ClientError> {
        let path = format!("/transactions/{}", encode_segment(&id.to_string()));
        self.post(mint, &path, Some(json!({ "hop": hop }))).await
    }

    async fn settle_transaction(
        &self,
        id: &ObjectId,
        hop: u8,
        secret: &str,
        mint: &str,
    ) -> Result<TransactionResource, ClientError> {
        let path = format!("/transactions/{}/settle", encode_segment(&id.to_string()));
        self.post(mint, &path, Some(json!({ "hop": hop, "secret": secret })))
            .await
    }

    async fn cancel_transaction(
        &self,
        id: &ObjectId,
        hop: u8,
        mint: &str,
    ) -> Result<TransactionResource, ClientError> {
        let path = format!("/transactions/{}/cancel", encode_segment(&id.to_string()));
        self.post(mint, &path, Some(json!({ "hop": hop }))).await
    }
}
