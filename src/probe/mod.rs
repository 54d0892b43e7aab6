//! Peer Probe Module
//!
//! Single bounded-timeout requests against a node's RPC interface:
//! - `/v2/neighbors` for the peers a node knows about
//! - `/v2/info` for its version banner and burn chain height
//!
//! Probes never fail towards the caller. Every failure is classified as a
//! [`ProbeError`], logged and counted, then mapped to an empty result.

mod client;
pub mod version;

pub use client::HttpPeerProbe;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::types::NodeInfo;

/// Why a single probe produced nothing
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Decode(String),
}

impl ProbeError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Network(_) => "network",
            ProbeError::Timeout => "timeout",
            ProbeError::Status(_) => "status",
            ProbeError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout
        } else if e.is_decode() {
            ProbeError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ProbeError::Status(status.as_u16())
        } else {
            ProbeError::Network(e.to_string())
        }
    }
}

/// Read-only queries against a peer node
#[async_trait]
pub trait PeerProbe: Send + Sync {
    /// Deduplicated neighbor addresses, empty on any failure
    async fn fetch_neighbors(&self, address: &str) -> BTreeSet<String>;

    /// Version and height, all fields unset on any failure
    async fn fetch_info(&self, address: &str) -> NodeInfo;
}

/// Build the RPC URL for a node address
///
/// Hosted deployments (address containing `marker`) are reached on the plain
/// path; self-hosted nodes on the well-known RPC port.
pub fn endpoint_url(address: &str, endpoint: &str, marker: &str, rpc_port: u16) -> String {
    if address.contains(marker) {
        format!("http://{}/v2/{}", address, endpoint)
    } else {
        format!("http://{}:{}/v2/{}", address, rpc_port, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_RPC_PORT, HOSTED_MARKER};

    #[test]
    fn test_self_hosted_url() {
        let url = endpoint_url("1.2.3.4", "neighbors", HOSTED_MARKER, DEFAULT_RPC_PORT);
        assert_eq!(url, "http://1.2.3.4:20443/v2/neighbors");
    }

    #[test]
    fn test_hosted_url() {
        let url = endpoint_url("seed-0.mainnet.stacks.co", "info", HOSTED_MARKER, DEFAULT_RPC_PORT);
        assert_eq!(url, "http://seed-0.mainnet.stacks.co/v2/info");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ProbeError::Timeout.kind(), "timeout");
        assert_eq!(ProbeError::Status(503).kind(), "status");
        assert_eq!(ProbeError::Decode("eof".to_string()).kind(), "decode");
        assert_eq!(ProbeError::Network("refused".to_string()).kind(), "network");
    }
}
