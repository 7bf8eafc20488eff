//! The main mint node struct — wires the subsystems together.
//!
//! Everything is an explicit service object passed by reference, so several
//! mint nodes can be constructed side by side in one process (the
//! multi-mint tests rely on this).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use scrip_client::{HttpMintClient, MintClient};
use scrip_rpc::{router, serve, RpcState};
use scrip_scheduler::Scheduler;
use scrip_settlement::{tasks, Settlement};
use scrip_store::MintStore;
use scrip_store_mem::MemStore;

use crate::config::MintConfig;
use crate::NodeError;

/// A running scrip mint.
pub struct MintNode {
    pub config: MintConfig,
    pub store: Arc<dyn MintStore>,
    pub scheduler: Arc<Scheduler>,
    pub settlement: Arc<Settlement>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl MintNode {
    /// Construct the node: storage, mint client, scheduler, settlement
    /// service, and the boot-time rehydration of pending retry tasks.
    ///
    /// The persistent SQL backend is provided by the deployment; the
    /// in-memory store backs development and test runs.
    pub fn new(config: MintConfig) -> Result<Self, NodeError> {
        let store: Arc<dyn MintStore> = Arc::new(MemStore::new());
        Self::with_store(config, store)
    }

    /// Construct the node on an externally provided storage backend.
    pub fn with_store(config: MintConfig, store: Arc<dyn MintStore>) -> Result<Self, NodeError> {
        let client: Arc<dyn MintClient> = Arc::new(HttpMintClient::new(config.use_tls));
        let scheduler = Scheduler::new(store.clone());
        let settlement = Settlement::new(
            config.host.clone(),
            store.clone(),
            client,
            scheduler.clone(),
            config.params(),
        );

        let registry = tasks::registry(&settlement);
        let rehydrated = scheduler.load_pending(&registry)?;
        if rehydrated > 0 {
            info!(count = rehydrated, "resuming persisted retry tasks");
        }

        let worker_handles = scrip_scheduler::spawn(&scheduler, config.scheduler_workers);

        Ok(Self {
            config,
            store,
            scheduler,
            settlement,
            worker_handles,
        })
    }

    /// Serve the HTTP surface until the process exits.
    pub async fn run(&self) -> Result<(), NodeError> {
        info!(host = %self.config.host, port = self.config.port, "starting mint node");
        serve(
            RpcState {
                settlement: self.settlement.clone(),
            },
            self.config.port,
        )
        .await
        .map_err(|e| NodeError::Server(e.to_string()))
    }

    /// The axum router, for embedding or tests.
    pub fn router(&self) -> axum::Router {
        router(RpcState {
            settlement: self.settlement.clone(),
        })
    }

    /// Stop the scheduler loops.
    pub async fn shutdown(mut self) {
        self.scheduler.shutdown();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.await;
        }
        info!("mint node stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MintConfig {
        toml::from_str(
            r#"
            host = "mint-test.example"
            use_tls = false
            "#,
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn node_wires_and_shuts_down() {
        let node = MintNode::new(config()).unwrap();
        assert_eq!(node.settlement.host(), "mint-test.example");
        assert_eq!(node.scheduler.pending_len(), 0);
        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn router_serves_health() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let node = MintNode::new(config()).unwrap();
        let response = node
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        node.shutdown().await;
    }
}
