//! HTTP implementation of the peer probe

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{endpoint_url, PeerProbe, ProbeError};
use crate::api::Metrics;
use crate::config::MapperConfig;
use crate::types::{NodeInfo, NULL_ADDRESS};

/// Payload of `/v2/neighbors`
#[derive(Debug, Deserialize)]
struct NeighborsResponse {
    sample: Vec<NeighborEntry>,
    inbound: Vec<NeighborEntry>,
    outbound: Vec<NeighborEntry>,
}

#[derive(Debug, Deserialize)]
struct NeighborEntry {
    ip: String,
}

/// Payload of `/v2/info` (only the fields the map uses)
#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    server_version: Option<String>,
    #[serde(default)]
    burn_block_height: Option<u64>,
}

/// Peer probe talking to the node RPC over plain HTTP
pub struct HttpPeerProbe {
    client: reqwest::Client,
    rpc_port: u16,
    hosted_marker: String,
    neighbors_timeout: Duration,
    info_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl HttpPeerProbe {
    /// Create a probe from the service configuration
    pub fn new(config: &MapperConfig, metrics: Arc<Metrics>) -> Result<Self, ProbeError> {
        // Each probe is an independent request; keep no idle connections around
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            client,
            rpc_port: config.rpc_port,
            hosted_marker: config.hosted_marker.clone(),
            neighbors_timeout: config.neighbors_timeout(),
            info_timeout: config.info_timeout(),
            metrics,
        })
    }

    fn url(&self, address: &str, endpoint: &str) -> String {
        endpoint_url(address, endpoint, &self.hosted_marker, self.rpc_port)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T, ProbeError> {
        self.metrics.inc_probes();

        let response = self.client.get(url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ProbeError::Decode(e.to_string()))
    }

    /// Neighbor probe with the failure kind preserved
    pub async fn try_fetch_neighbors(&self, address: &str) -> Result<BTreeSet<String>, ProbeError> {
        let url = self.url(address, "neighbors");
        let response: NeighborsResponse = self.get_json(&url, self.neighbors_timeout).await?;
        Ok(collect_neighbors(response))
    }

    /// Info probe with the failure kind preserved
    pub async fn try_fetch_info(&self, address: &str) -> Result<NodeInfo, ProbeError> {
        let url = self.url(address, "info");
        let response: InfoResponse = self.get_json(&url, self.info_timeout).await?;
        Ok(NodeInfo {
            server_version: response.server_version,
            burn_block_height: response.burn_block_height,
        })
    }

    fn record_failure(&self, address: &str, endpoint: &str, error: &ProbeError) {
        self.metrics.record_probe_failure(error);
        debug!("{} probe of {} failed ({}): {}", endpoint, address, error.kind(), error);
    }
}

#[async_trait]
impl PeerProbe for HttpPeerProbe {
    async fn fetch_neighbors(&self, address: &str) -> BTreeSet<String> {
        match self.try_fetch_neighbors(address).await {
            Ok(neighbors) => neighbors,
            Err(e) => {
                self.record_failure(address, "neighbors", &e);
                BTreeSet::new()
            }
        }
    }

    async fn fetch_info(&self, address: &str) -> NodeInfo {
        match self.try_fetch_info(address).await {
            Ok(info) => info,
            Err(e) => {
                self.record_failure(address, "info", &e);
                NodeInfo::default()
            }
        }
    }
}

/// Merge sample, inbound and outbound peers, dropping the null address
fn collect_neighbors(response: NeighborsResponse) -> BTreeSet<String> {
    response
        .sample
        .into_iter()
        .chain(response.inbound)
        .chain(response.outbound)
        .map(|entry| entry.ip)
        .filter(|ip| ip != NULL_ADDRESS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use std::sync::atomic::Ordering;

    async fn spawn_node(app: Router) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    fn probe_for(port: u16) -> (HttpPeerProbe, Arc<Metrics>) {
        let mut config = MapperConfig::default();
        config.rpc_port = port;
        config.info_timeout_secs = 1;
        let metrics = Arc::new(Metrics::new());
        (HttpPeerProbe::new(&config, metrics.clone()).unwrap(), metrics)
    }

    fn neighbors_payload() -> serde_json::Value {
        serde_json::json!({
            "sample": [{"ip": "10.0.0.1", "port": 20444}, {"ip": "0.0.0.0"}],
            "inbound": [{"ip": "10.0.0.2"}],
            "outbound": [{"ip": "10.0.0.1"}, {"ip": "10.0.0.3"}],
        })
    }

    #[test]
    fn test_collect_neighbors() {
        let response: NeighborsResponse = serde_json::from_value(neighbors_payload()).unwrap();
        let neighbors = collect_neighbors(response);

        assert_eq!(neighbors.len(), 3);
        assert!(neighbors.contains("10.0.0.1"));
        assert!(!neighbors.contains(NULL_ADDRESS));
    }

    #[tokio::test]
    async fn test_fetch_neighbors_and_info() {
        let app = Router::new()
            .route("/v2/neighbors", get(|| async { Json(neighbors_payload()) }))
            .route(
                "/v2/info",
                get(|| async {
                    Json(serde_json::json!({
                        "server_version": "stacks-node 2.5.0.0.0 (master:abc123, release, linux [x86_64])",
                        "burn_block_height": 840000,
                        "peer_version": 402653189u64,
                    }))
                }),
            );
        let port = spawn_node(app).await;
        let (probe, metrics) = probe_for(port);

        let neighbors = probe.fetch_neighbors("127.0.0.1").await;
        assert_eq!(neighbors.len(), 3);

        let info = probe.fetch_info("127.0.0.1").await;
        assert_eq!(info.burn_block_height, Some(840000));
        assert!(info.server_version.unwrap().starts_with("stacks-node 2.5"));

        assert_eq!(metrics.probes_total.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_bad_status_yields_empty() {
        let app = Router::new()
            .route("/v2/neighbors", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let port = spawn_node(app).await;
        let (probe, _) = probe_for(port);

        let result = probe.try_fetch_neighbors("127.0.0.1").await;
        assert!(matches!(result, Err(ProbeError::Status(503))));
        assert!(probe.fetch_neighbors("127.0.0.1").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_yields_empty() {
        let app = Router::new()
            .route("/v2/neighbors", get(|| async { Json(serde_json::json!({"sample": []})) }))
            .route("/v2/info", get(|| async { "not json" }));
        let port = spawn_node(app).await;
        let (probe, metrics) = probe_for(port);

        assert!(probe.fetch_neighbors("127.0.0.1").await.is_empty());
        assert_eq!(probe.fetch_info("127.0.0.1").await, NodeInfo::default());
        assert_eq!(metrics.probe_decode_errors.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (probe, metrics) = probe_for(port);

        assert!(probe.fetch_neighbors("127.0.0.1").await.is_empty());
        assert!(!probe.fetch_info("127.0.0.1").await.is_known());
        assert_eq!(metrics.probe_network_errors.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_slow_node_times_out() {
        let app = Router::new().route(
            "/v2/info",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(serde_json::json!({"server_version": "late"}))
            }),
        );
        let port = spawn_node(app).await;
        let (probe, metrics) = probe_for(port);

        assert!(!probe.fetch_info("127.0.0.1").await.is_known());
        assert_eq!(metrics.probe_timeouts.load(Ordering::Relaxed), 1);
    }
}
