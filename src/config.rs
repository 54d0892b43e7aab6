//! Node Map Configuration
//!
//! Configurable parameters for the crawler, the enrichment probes and the
//! read API. Defaults mirror the behaviour of the public node map.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{DEFAULT_RPC_PORT, HOSTED_MARKER};

/// Upper bound for `location_max_age_days` (ten years)
pub const MAX_LOCATION_AGE_DAYS: i64 = 3650;

/// Main configuration for the node map service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    // === Network ===

    /// Addresses the crawl starts from
    pub seed_nodes: Vec<String>,

    /// Network identifier reported by the read API
    pub network: String,

    /// RPC port appended to self-hosted node addresses
    pub rpc_port: u16,

    /// Addresses containing this substring are queried without a port
    pub hosted_marker: String,

    // === Probes ===

    /// Timeout for neighbor probes (seconds)
    pub neighbors_timeout_secs: u64,

    /// Timeout for info probes (seconds)
    pub info_timeout_secs: u64,

    /// Timeout for geolocation lookups (seconds)
    pub geo_timeout_secs: u64,

    /// Geolocation service base URL, the address is appended as last segment
    pub geo_base_url: String,

    // === Crawl ===

    /// Expansion rounds after the seed expansion
    pub crawl_hops: usize,

    /// Neighbor probes in flight within a single round
    pub crawl_concurrency: usize,

    /// Sleep between full discovery cycles (seconds)
    pub scan_interval_secs: u64,

    // === Rescan ===

    /// Sleep between metadata-only rescans (seconds)
    pub rescan_interval_secs: u64,

    /// Delay before the first rescan (seconds)
    pub rescan_initial_delay_secs: u64,

    /// Info probes in flight during a rescan
    pub rescan_concurrency: usize,

    // === Cache ===

    /// Age after which a cached location is fetched again (days)
    pub location_max_age_days: i64,

    // === API ===

    /// Port for the read API
    pub api_port: u16,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            // Network
            seed_nodes: vec![],
            network: "mainnet".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            hosted_marker: HOSTED_MARKER.to_string(),

            // Probes
            neighbors_timeout_secs: 4,
            info_timeout_secs: 4,
            geo_timeout_secs: 5,
            geo_base_url: "https://freegeoip.app/json".to_string(),

            // Crawl - 2 minute cycle
            crawl_hops: 3,
            crawl_concurrency: 10,
            scan_interval_secs: 120,

            // Rescan - hourly, first one after 5 minutes
            rescan_interval_secs: 3600,
            rescan_initial_delay_secs: 300,
            rescan_concurrency: 10,

            // Cache
            location_max_age_days: 30,

            // API
            api_port: 8089,
        }
    }
}

impl MapperConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    // Builder-style methods for CLI overrides

    /// Override the seed list from a comma-separated value
    pub fn with_seed_nodes(mut self, seeds: Option<String>) -> Self {
        if let Some(seeds) = seeds {
            self.seed_nodes = parse_seed_list(&seeds);
        }
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        if let Some(network) = network {
            self.network = network;
        }
        self
    }

    pub fn with_api_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.api_port = port;
        }
        self
    }

    pub fn neighbors_timeout(&self) -> Duration {
        Duration::from_secs(self.neighbors_timeout_secs)
    }

    pub fn info_timeout(&self) -> Duration {
        Duration::from_secs(self.info_timeout_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo_timeout_secs)
    }

    pub fn location_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.location_max_age_days)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.crawl_concurrency == 0 || self.rescan_concurrency == 0 {
            anyhow::bail!("crawl_concurrency and rescan_concurrency must be at least 1");
        }

        if self.neighbors_timeout_secs == 0 || self.info_timeout_secs == 0 || self.geo_timeout_secs == 0 {
            anyhow::bail!("probe timeouts must be greater than zero");
        }

        if self.scan_interval_secs == 0 {
            anyhow::bail!("scan_interval_secs must be greater than zero");
        }

        if self.rescan_interval_secs < self.scan_interval_secs {
            anyhow::bail!(
                "rescan_interval_secs ({}) must not be shorter than scan_interval_secs ({})",
                self.rescan_interval_secs,
                self.scan_interval_secs
            );
        }

        if self.location_max_age_days <= 0 || self.location_max_age_days > MAX_LOCATION_AGE_DAYS {
            anyhow::bail!(
                "location_max_age_days must be between 1 and {}",
                MAX_LOCATION_AGE_DAYS
            );
        }

        Ok(())
    }
}

/// Split a comma-separated seed list, dropping blanks
pub fn parse_seed_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
