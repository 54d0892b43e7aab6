//! Metrics Collection
//!
//! Collects and exposes metrics for monitoring the crawler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::probe::ProbeError;

/// Metrics collector for the node map
#[derive(Default)]
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// Completed full discovery cycles
    pub crawls_completed: AtomicU64,

    /// Completed metadata-only rescans
    pub rescans_completed: AtomicU64,

    /// Probes issued (neighbors and info)
    pub probes_total: AtomicU64,

    /// Probe failures by kind
    pub probe_network_errors: AtomicU64,
    pub probe_timeouts: AtomicU64,
    pub probe_bad_status: AtomicU64,
    pub probe_decode_errors: AtomicU64,

    /// Geolocation lookups issued
    pub geo_lookups: AtomicU64,

    /// Geolocation lookups that produced a location
    pub geo_resolved: AtomicU64,

    /// Nodes in the registry after the last save
    pub known_nodes: AtomicU64,

    /// Public nodes in the registry after the last save
    pub public_nodes: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn inc_crawls_completed(&self) {
        self.crawls_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rescans_completed(&self) {
        self.rescans_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_probes(&self) {
        self.probes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed probe under its failure kind
    pub fn record_probe_failure(&self, error: &ProbeError) {
        let counter = match error {
            ProbeError::Network(_) => &self.probe_network_errors,
            ProbeError::Timeout => &self.probe_timeouts,
            ProbeError::Status(_) => &self.probe_bad_status,
            ProbeError::Decode(_) => &self.probe_decode_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a geolocation lookup and whether it resolved
    pub fn record_geo_lookup(&self, resolved: bool) {
        self.geo_lookups.fetch_add(1, Ordering::Relaxed);
        if resolved {
            self.geo_resolved.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_node_counts(&self, known: u64, public: u64) {
        self.known_nodes.store(known, Ordering::Relaxed);
        self.public_nodes.store(public, Ordering::Relaxed);
    }

    fn probe_failures_total(&self) -> u64 {
        self.probe_network_errors.load(Ordering::Relaxed)
            + self.probe_timeouts.load(Ordering::Relaxed)
            + self.probe_bad_status.load(Ordering::Relaxed)
            + self.probe_decode_errors.load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP stx_node_map_uptime_seconds Service uptime in seconds\n\
             # TYPE stx_node_map_uptime_seconds gauge\n\
             stx_node_map_uptime_seconds {}\n\n",
            self.uptime_secs()
        ));

        // Cycles
        output.push_str(&format!(
            "# HELP stx_node_map_crawls_total Completed discovery cycles\n\
             # TYPE stx_node_map_crawls_total counter\n\
             stx_node_map_crawls_total {}\n\n",
            self.crawls_completed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP stx_node_map_rescans_total Completed metadata rescans\n\
             # TYPE stx_node_map_rescans_total counter\n\
             stx_node_map_rescans_total {}\n\n",
            self.rescans_completed.load(Ordering::Relaxed)
        ));

        // Probes
        output.push_str(&format!(
            "# HELP stx_node_map_probes_total Node probes issued\n\
             # TYPE stx_node_map_probes_total counter\n\
             stx_node_map_probes_total {}\n\n",
            self.probes_total.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP stx_node_map_probe_failures_total Failed node probes by kind\n\
             # TYPE stx_node_map_probe_failures_total counter\n",
        );
        for (kind, counter) in [
            ("network", &self.probe_network_errors),
            ("timeout", &self.probe_timeouts),
            ("status", &self.probe_bad_status),
            ("decode", &self.probe_decode_errors),
        ] {
            output.push_str(&format!(
                "stx_node_map_probe_failures_total{{kind=\"{}\"}} {}\n",
                kind,
                counter.load(Ordering::Relaxed)
            ));
        }
        output.push('\n');

        // Geolocation
        output.push_str(&format!(
            "# HELP stx_node_map_geo_lookups_total Geolocation lookups issued\n\
             # TYPE stx_node_map_geo_lookups_total counter\n\
             stx_node_map_geo_lookups_total {}\n\n",
            self.geo_lookups.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP stx_node_map_geo_resolved_total Geolocation lookups that resolved\n\
             # TYPE stx_node_map_geo_resolved_total counter\n\
             stx_node_map_geo_resolved_total {}\n\n",
            self.geo_resolved.load(Ordering::Relaxed)
        ));

        // Registry
        output.push_str(&format!(
            "# HELP stx_node_map_known_nodes Nodes in the registry\n\
             # TYPE stx_node_map_known_nodes gauge\n\
             stx_node_map_known_nodes {}\n\n",
            self.known_nodes.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP stx_node_map_public_nodes Public nodes in the registry\n\
             # TYPE stx_node_map_public_nodes gauge\n\
             stx_node_map_public_nodes {}\n\n",
            self.public_nodes.load(Ordering::Relaxed)
        ));

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "crawls_completed": self.crawls_completed.load(Ordering::Relaxed),
            "rescans_completed": self.rescans_completed.load(Ordering::Relaxed),
            "probes": {
                "total": self.probes_total.load(Ordering::Relaxed),
                "failed": self.probe_failures_total(),
                "network": self.probe_network_errors.load(Ordering::Relaxed),
                "timeout": self.probe_timeouts.load(Ordering::Relaxed),
                "status": self.probe_bad_status.load(Ordering::Relaxed),
                "decode": self.probe_decode_errors.load(Ordering::Relaxed),
            },
            "geolocation": {
                "lookups": self.geo_lookups.load(Ordering::Relaxed),
                "resolved": self.geo_resolved.load(Ordering::Relaxed),
            },
            "registry": {
                "known_nodes": self.known_nodes.load(Ordering::Relaxed),
                "public_nodes": self.public_nodes.load(Ordering::Relaxed),
            },
        })
    }
}
