//! Scan Orchestrator
//!
//! Drives the two independent activities of the service:
//!
//! ```text
//! Discovery cycle:  Idle -> SeedExpansion -> Scanning -> Enriching -> Persisting -> Idle
//! Periodic rescan:  Idle -> PeriodicRescan -> Idle
//! ```
//!
//! The discovery cycle crawls from the seeds, enriches every discovered
//! address one by one (info probe, gated geolocation, merge) and rewrites the
//! registry. The rescan refreshes version and height of already known
//! addresses with a bounded pool of concurrent info probes.
//!
//! Both activities share nothing but the registry file and the status file.
//! The last full write wins: the rescan only touches addresses already
//! present and the next discovery cycle writes a superset, so a lost update
//! heals within one cycle.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::Metrics;
use crate::config::MapperConfig;
use crate::crawl::CrawlFrontier;
use crate::geo::{is_known_private, GeoResolver};
use crate::probe::PeerProbe;
use crate::registry::enrichment::{merge, refresh_info, should_refresh_location, LocationLookup};
use crate::registry::{RegistryFile, RegistryStats};
use crate::status::{ScanPhase, StatusReporter};
use crate::types::{NodeInfo, NodeRecord};

/// Result of one discovery cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Addresses found by the crawl in this cycle
    pub discovered: usize,

    /// Registry contents after the save
    pub stats: RegistryStats,
}

/// Coordinates crawling, enrichment and persistence
pub struct ScanOrchestrator {
    config: Arc<MapperConfig>,
    probe: Arc<dyn PeerProbe>,
    geo: Arc<dyn GeoResolver>,
    store: Arc<RegistryFile>,
    status: Arc<StatusReporter>,
    metrics: Arc<Metrics>,

    /// Completion time of the last successful discovery cycle
    last_scan: RwLock<Option<DateTime<Utc>>>,
}

impl ScanOrchestrator {
    pub fn new(
        config: Arc<MapperConfig>,
        probe: Arc<dyn PeerProbe>,
        geo: Arc<dyn GeoResolver>,
        store: Arc<RegistryFile>,
        status: Arc<StatusReporter>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            probe,
            geo,
            store,
            status,
            metrics,
            last_scan: RwLock::new(None),
        }
    }

    /// Pick up the last scan time from a previous run
    pub async fn restore_last_scan(&self) {
        let previous = self.status.read().await.last_scan;
        *self.last_scan.write().await = previous;
    }

    /// Run one full discovery cycle
    pub async fn run_full_scan(&self) -> anyhow::Result<ScanSummary> {
        let mut registry = match self.store.load().await {
            Ok(registry) => registry,
            Err(e) => {
                self.report(ScanPhase::Failed, 0).await;
                return Err(e.into());
            }
        };

        self.report(ScanPhase::SeedExpansion, registry.len()).await;

        let frontier = CrawlFrontier::new(
            self.probe.clone(),
            self.config.crawl_hops,
            self.config.crawl_concurrency,
        );

        let mut crawl = frontier.expand_seeds(&self.config.seed_nodes).await;
        if crawl.is_empty() {
            self.report(ScanPhase::NoSeedsReachable, registry.len()).await;
            return Ok(ScanSummary {
                discovered: 0,
                stats: registry.stats(),
            });
        }

        self.report(ScanPhase::Scanning, registry.len()).await;
        frontier.expand_hops(&mut crawl).await;

        info!("🗺️  {} nodes found, enriching", crawl.discovered.len());
        self.report(ScanPhase::Enriching, crawl.discovered.len()).await;

        for address in &crawl.discovered {
            let neighbors = match crawl.neighbors.get(address) {
                Some(neighbors) => neighbors.clone(),
                None => self.probe.fetch_neighbors(address).await,
            };
            let record = self.enrich(registry.get(address), address, &neighbors).await;
            registry.upsert(record);
        }

        self.report(ScanPhase::Persisting, registry.len()).await;

        if let Err(e) = self.store.save(&registry).await {
            self.report(ScanPhase::Failed, registry.len()).await;
            return Err(e.into());
        }

        let finished = Utc::now();
        *self.last_scan.write().await = Some(finished);
        self.report(ScanPhase::Idle, registry.len()).await;

        let stats = registry.stats();
        self.metrics.inc_crawls_completed();
        self.metrics
            .set_node_counts(stats.total_nodes as u64, stats.public_nodes as u64);

        info!(
            "📊 Scan complete: {} discovered, {} known ({} public, {} private), {} located in {} countries",
            crawl.discovered.len(),
            stats.total_nodes,
            stats.public_nodes,
            stats.private_nodes,
            stats.located_nodes,
            stats.unique_countries
        );

        Ok(ScanSummary {
            discovered: crawl.discovered.len(),
            stats,
        })
    }

    /// Probe one address and merge it with its stored record
    async fn enrich(
        &self,
        existing: Option<&NodeRecord>,
        address: &str,
        neighbors: &BTreeSet<String>,
    ) -> NodeRecord {
        let info = self.probe.fetch_info(address).await;
        let lookup = self.lookup_location(existing, address).await;
        let record = merge(existing, address, &info, neighbors, lookup, Utc::now());

        debug!(
            "{} is a {:?} node ({}, {} neighbors)",
            address,
            record.node_type,
            record.version.version_number,
            neighbors.len()
        );

        record
    }

    /// Geolocation step, gated by the cached location's age
    async fn lookup_location(&self, existing: Option<&NodeRecord>, address: &str) -> LocationLookup {
        if !should_refresh_location(existing, Utc::now(), self.config.location_max_age()) {
            return LocationLookup::Skipped;
        }

        if is_known_private(address) {
            return LocationLookup::KnownPrivate;
        }

        match self.geo.resolve_location(address).await {
            Some(location) => LocationLookup::Resolved(location),
            None => LocationLookup::Failed,
        }
    }

    /// Refresh version and height of every known address
    ///
    /// Returns the number of records updated.
    pub async fn run_rescan(&self) -> anyhow::Result<usize> {
        let known = self.store.load().await?;
        if known.is_empty() {
            debug!("Registry empty, nothing to rescan");
            return Ok(0);
        }

        self.report(ScanPhase::PeriodicRescan, known.len()).await;
        info!("🔁 Rescanning {} known nodes", known.len());

        let infos = self.fetch_infos(known.addresses()).await;

        // Re-read so that a discovery save made meanwhile is not thrown away
        let mut registry = self.store.load().await?;
        let now = Utc::now();
        let mut updated = 0;
        for (address, info) in &infos {
            if let Some(record) = registry.get_mut(address) {
                if refresh_info(record, info, now) {
                    updated += 1;
                }
            }
        }

        self.store.save(&registry).await?;
        self.report(ScanPhase::Idle, registry.len()).await;
        self.metrics.inc_rescans_completed();

        info!("🔁 Rescan complete: {}/{} nodes answered", updated, infos.len());
        Ok(updated)
    }

    /// Info probes with at most `rescan_concurrency` in flight
    async fn fetch_infos(&self, addresses: Vec<String>) -> Vec<(String, NodeInfo)> {
        let semaphore = Arc::new(Semaphore::new(self.config.rescan_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for address in addresses {
            let probe = self.probe.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let info = probe.fetch_info(&address).await;
                (address, info)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("Info probe task failed: {}", e),
            }
        }

        results
    }

    async fn report(&self, phase: ScanPhase, nodes_count: usize) {
        let last_scan = *self.last_scan.read().await;
        if let Err(e) = self.status.report(phase, nodes_count, last_scan).await {
            warn!("Failed to write status: {}", e);
        }
    }
}

/// Discovery cycle, forever, sleeping `scan_interval_secs` between runs
pub async fn run_discovery_loop(orchestrator: Arc<ScanOrchestrator>, interval_secs: u64) {
    info!("🔍 Starting discovery loop (every {}s)", interval_secs);
    orchestrator.restore_last_scan().await;

    loop {
        if let Err(e) = orchestrator.run_full_scan().await {
            error!("Discovery cycle failed: {:#}", e);
        }

        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }
}

/// Metadata rescan, forever, after an initial delay
pub async fn run_periodic_rescan(orchestrator: Arc<ScanOrchestrator>, initial_delay_secs: u64, interval_secs: u64) {
    info!(
        "🔁 Starting periodic rescan (first in {}s, then every {}s)",
        initial_delay_secs, interval_secs
    );
    tokio::time::sleep(Duration::from_secs(initial_delay_secs)).await;

    loop {
        if let Err(e) = orchestrator.run_rescan().await {
            error!("Periodic rescan failed: {:#}", e);
        }

        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }
}
