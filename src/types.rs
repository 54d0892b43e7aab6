//! Core types for the node map
//!
//! These types define the persisted registry records, the status snapshot
//! served to the read API, and the payloads decoded from peer nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Placeholder for any version field that could not be extracted
pub const UNKNOWN: &str = "unknown";

/// Country used when a geolocation lookup was attempted and failed
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Country used for addresses that are never sent to the geolocation service
pub const PRIVATE_COUNTRY: &str = "Private";

/// The unspecified address some nodes report among their neighbors
pub const NULL_ADDRESS: &str = "0.0.0.0";

/// Default RPC port of a self-hosted Stacks node
pub const DEFAULT_RPC_PORT: u16 = 20443;

/// Substring identifying hosted deployments (reachable without explicit port)
pub const HOSTED_MARKER: &str = "stack";

// =============================================================================
// NODE INFO (decoded from the info endpoint)
// =============================================================================

/// Metadata reported by a node's info endpoint
///
/// Every field is unset when the probe failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    /// Raw version banner (e.g. `stacks-node 2.5.0.0.0 (master:abc123, ...)`)
    pub server_version: Option<String>,

    /// Burn chain height reported by the node
    pub burn_block_height: Option<u64>,
}

impl NodeInfo {
    /// Whether the info endpoint answered at all
    pub fn is_known(&self) -> bool {
        self.server_version.is_some() || self.burn_block_height.is_some()
    }
}

// =============================================================================
// VERSION
// =============================================================================

/// Structured fields extracted from a version banner
///
/// Missing fields hold [`UNKNOWN`], never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVersion {
    pub version_number: String,
    pub commit_hash: String,
    pub build_type: String,
    pub platform: String,
}

impl Default for ParsedVersion {
    fn default() -> Self {
        Self {
            version_number: UNKNOWN.to_string(),
            commit_hash: UNKNOWN.to_string(),
            build_type: UNKNOWN.to_string(),
            platform: UNKNOWN.to_string(),
        }
    }
}

// =============================================================================
// LOCATION
// =============================================================================

/// Approximate location of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude; absent for sentinel locations
    pub lat: Option<f64>,

    /// Longitude; absent for sentinel locations
    pub lng: Option<f64>,

    /// Country name, or one of the sentinel countries
    pub country: String,

    /// City name (may be empty)
    pub city: String,
}

impl GeoLocation {
    /// Sentinel for a lookup that was attempted and produced nothing
    pub fn unknown() -> Self {
        Self::sentinel(UNKNOWN_COUNTRY)
    }

    /// Sentinel for an address that is never geolocated
    pub fn private() -> Self {
        Self::sentinel(PRIVATE_COUNTRY)
    }

    fn sentinel(country: &str) -> Self {
        Self {
            lat: None,
            lng: None,
            country: country.to_string(),
            city: String::new(),
        }
    }

    /// True for real lookups, false for the Unknown/Private sentinels
    pub fn is_resolved(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

// =============================================================================
// NODE RECORD
// =============================================================================

/// Node classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Answered the neighbors probe with at least one peer
    Public,

    /// Did not answer the neighbors probe, or answered with no peers
    #[default]
    Private,
}

/// How the node could be reached during the last probe pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Info endpoint answered
    Api,

    /// Info endpoint silent but neighbors were reported
    P2pOnly,

    /// Nothing answered
    #[default]
    Offline,
}

impl ConnectionStatus {
    pub fn classify(info: &NodeInfo, neighbor_count: usize) -> Self {
        if info.is_known() {
            ConnectionStatus::Api
        } else if neighbor_count > 0 {
            ConnectionStatus::P2pOnly
        } else {
            ConnectionStatus::Offline
        }
    }
}

/// One entry per discovered address
///
/// Everything but `address` can be derived again by the next probe pass, so
/// records written by older deployments load with defaults for the fields
/// they lack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Network-reachable host; unique key of the registry
    pub address: String,

    /// Raw version banner
    #[serde(default)]
    pub server_version: Option<String>,

    /// Parsed version banner
    #[serde(default)]
    pub version: ParsedVersion,

    /// Chain progress reported by the node
    #[serde(default)]
    pub burn_block_height: Option<u64>,

    #[serde(default)]
    pub node_type: NodeType,

    #[serde(default)]
    pub connection_status: ConnectionStatus,

    /// Location; `location_fetched_at` is set iff this is set
    #[serde(default)]
    pub location: Option<GeoLocation>,

    #[serde(default)]
    pub location_fetched_at: Option<DateTime<Utc>>,

    /// Most recent probe pass touching this record
    #[serde(default)]
    pub last_seen: DateTime<Utc>,
}

// =============================================================================
// STATUS
// =============================================================================

/// Snapshot of the discovery engine's progress, served by the read API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Human readable phase
    pub status: String,

    /// Number of nodes known at the time of writing
    pub nodes_count: usize,

    /// Whether a scan is currently running
    pub scanning: bool,

    /// Completion time of the last full scan
    pub last_scan: Option<DateTime<Utc>>,

    /// When this record was written
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            status: "Unknown".to_string(),
            nodes_count: 0,
            scanning: false,
            last_scan: None,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status() {
        let status = StatusRecord::default();
        assert_eq!(status.status, "Unknown");
        assert_eq!(status.nodes_count, 0);
        assert!(!status.scanning);
        assert!(status.last_scan.is_none());
    }

    #[test]
    fn test_sentinel_locations() {
        assert!(!GeoLocation::private().is_resolved());
        assert_eq!(GeoLocation::private().country, PRIVATE_COUNTRY);
        assert_eq!(GeoLocation::unknown().country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn test_connection_status() {
        let answered = NodeInfo {
            server_version: Some("stacks-node 2.5.0.0.0".to_string()),
            burn_block_height: None,
        };
        assert_eq!(ConnectionStatus::classify(&answered, 0), ConnectionStatus::Api);
        assert_eq!(ConnectionStatus::classify(&NodeInfo::default(), 3), ConnectionStatus::P2pOnly);
        assert_eq!(ConnectionStatus::classify(&NodeInfo::default(), 0), ConnectionStatus::Offline);
    }

    #[test]
    fn test_record_serialization_keys() {
        let record = NodeRecord {
            address: "1.2.3.4".to_string(),
            server_version: None,
            version: ParsedVersion::default(),
            burn_block_height: Some(10),
            node_type: NodeType::Public,
            connection_status: ConnectionStatus::P2pOnly,
            location: None,
            location_fetched_at: None,
            last_seen: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["node_type"], "public");
        assert_eq!(json["connection_status"], "p2p_only");
        assert_eq!(json["version"]["version_number"], "unknown");
    }
}
