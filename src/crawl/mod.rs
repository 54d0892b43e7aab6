//! Crawl Frontier
//!
//! Breadth-first expansion of the peer graph from the configured seeds.
//!
//! The crawl starts from the union of the seeds' neighbor sets and then runs
//! a fixed number of rounds. Each round probes every address discovered so
//! far (once per round) and adds whatever is new. The round count is a hard
//! depth bound; the crawl does not stop early when the set converges.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::probe::PeerProbe;

/// Outcome of a crawl
#[derive(Debug, Default)]
pub struct CrawlResult {
    /// Every address discovered as someone's neighbor
    pub discovered: BTreeSet<String>,

    /// Last neighbor set observed for each probed address
    pub neighbors: HashMap<String, BTreeSet<String>>,
}

impl CrawlResult {
    /// Whether the seed expansion found nothing
    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }
}

/// Hop-bounded crawler over a [`PeerProbe`]
pub struct CrawlFrontier {
    probe: Arc<dyn PeerProbe>,
    hops: usize,
    concurrency: usize,
}

impl CrawlFrontier {
    pub fn new(probe: Arc<dyn PeerProbe>, hops: usize, concurrency: usize) -> Self {
        Self {
            probe,
            hops,
            concurrency: concurrency.max(1),
        }
    }

    /// Expand from the seeds
    ///
    /// Seeds only appear in the result when another node reports them.
    #[cfg(test)]
    pub async fn expand(&self, seeds: &[String]) -> CrawlResult {
        let mut result = self.expand_seeds(seeds).await;
        if !result.is_empty() {
            self.expand_hops(&mut result).await;
        }
        result
    }

    /// Union of the seeds' neighbor sets
    pub async fn expand_seeds(&self, seeds: &[String]) -> CrawlResult {
        let seeds: BTreeSet<String> = seeds.iter().cloned().collect();
        let mut result = CrawlResult::default();

        self.absorb(&mut result, self.probe_round(&seeds).await);

        if result.is_empty() {
            info!("🌱 No seed nodes reachable");
        } else {
            info!("🌱 Seed expansion found {} nodes", result.discovered.len());
        }

        result
    }

    /// Run the fixed number of expansion rounds over `result`
    pub async fn expand_hops(&self, result: &mut CrawlResult) {
        for round in 1..=self.hops {
            let frontier = result.discovered.clone();
            let before = result.discovered.len();

            self.absorb(result, self.probe_round(&frontier).await);

            info!(
                "🔍 Hop {}/{}: probed {} nodes, {} new, {} total",
                round,
                self.hops,
                frontier.len(),
                result.discovered.len() - before,
                result.discovered.len()
            );
        }
    }

    fn absorb(&self, result: &mut CrawlResult, probed: Vec<(String, BTreeSet<String>)>) {
        for (address, neighbors) in probed {
            result.discovered.extend(neighbors.iter().cloned());
            result.neighbors.insert(address, neighbors);
        }
    }

    /// Probe each address once, at most `concurrency` in flight
    async fn probe_round(&self, addresses: &BTreeSet<String>) -> Vec<(String, BTreeSet<String>)> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for address in addresses {
            let address = address.clone();
            let probe = self.probe.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                debug!("Scanning {}", address);
                let neighbors = probe.fetch_neighbors(&address).await;
                (address, neighbors)
            });
        }

        let mut results = Vec::with_capacity(addresses.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(probed) => results.push(probed),
                Err(e) => warn!("Neighbor probe task failed: {}", e),
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PacedProbe, StaticProbe};
    use std::time::Duration;

    fn seeds(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_three_seed_expansion() {
        let probe = Arc::new(
            StaticProbe::new()
                .with_neighbors("1", &["2", "3"])
                .with_neighbors("2", &["4"])
                .with_neighbors("3", &[]),
        );
        let frontier = CrawlFrontier::new(probe, 1, 4);

        let result = frontier.expand(&seeds(&["1", "2", "3"])).await;

        assert_eq!(result.discovered, set(&["2", "3", "4"]));
    }

    #[tokio::test]
    async fn test_seed_not_included_unless_reported() {
        let probe = Arc::new(
            StaticProbe::new()
                .with_neighbors("seed", &["a"])
                .with_neighbors("a", &["b"]),
        );
        let frontier = CrawlFrontier::new(probe, 3, 4);

        let result = frontier.expand(&seeds(&["seed"])).await;

        assert_eq!(result.discovered, set(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_hop_bound() {
        // Chain a -> b -> c -> d -> e, seed reports a
        let probe = Arc::new(
            StaticProbe::new()
                .with_neighbors("seed", &["a"])
                .with_neighbors("a", &["b"])
                .with_neighbors("b", &["c"])
                .with_neighbors("c", &["d"])
                .with_neighbors("d", &["e"]),
        );

        let shallow = CrawlFrontier::new(probe.clone(), 2, 4).expand(&seeds(&["seed"])).await;
        assert_eq!(shallow.discovered, set(&["a", "b", "c"]));

        let deep = CrawlFrontier::new(probe, 3, 4).expand(&seeds(&["seed"])).await;
        assert_eq!(deep.discovered, set(&["a", "b", "c", "d"]));
    }

    #[tokio::test]
    async fn test_order_independent() {
        let build = || {
            Arc::new(
                StaticProbe::new()
                    .with_neighbors("x", &["a", "b"])
                    .with_neighbors("y", &["b", "c"])
                    .with_neighbors("a", &["d"])
                    .with_neighbors("c", &["d", "e"]),
            )
        };

        let forward = CrawlFrontier::new(build(), 3, 2).expand(&seeds(&["x", "y"])).await;
        let backward = CrawlFrontier::new(build(), 3, 2).expand(&seeds(&["y", "x"])).await;

        assert_eq!(forward.discovered, backward.discovered);
        assert_eq!(forward.discovered, set(&["a", "b", "c", "d", "e"]));
    }

    #[tokio::test]
    async fn test_probed_once_per_round() {
        // "d" is reachable from both "a" and "c"
        let probe = Arc::new(
            StaticProbe::new()
                .with_neighbors("seed", &["a", "c"])
                .with_neighbors("a", &["d"])
                .with_neighbors("c", &["d"]),
        );
        let frontier = CrawlFrontier::new(probe.clone(), 3, 4);

        frontier.expand(&seeds(&["seed", "seed"])).await;

        assert_eq!(probe.neighbor_calls("seed"), 1);
        assert_eq!(probe.neighbor_calls("a"), 3);
        // discovered in round 1, probed in rounds 2 and 3
        assert_eq!(probe.neighbor_calls("d"), 2);
    }

    #[tokio::test]
    async fn test_no_seeds_reachable() {
        let probe = Arc::new(StaticProbe::new());
        let frontier = CrawlFrontier::new(probe.clone(), 3, 4);

        let result = frontier.expand(&seeds(&["dead-1", "dead-2"])).await;

        assert!(result.is_empty());
        assert_eq!(probe.neighbor_calls("dead-1"), 1);
    }

    #[tokio::test]
    async fn test_neighbor_sets_recorded() {
        let probe = Arc::new(
            StaticProbe::new()
                .with_neighbors("seed", &["a", "b"])
                .with_neighbors("a", &["b"]),
        );
        let result = CrawlFrontier::new(probe, 1, 4).expand(&seeds(&["seed"])).await;

        assert_eq!(result.neighbors.get("a"), Some(&set(&["b"])));
        assert_eq!(result.neighbors.get("b"), Some(&BTreeSet::new()));
    }

    #[tokio::test]
    async fn test_round_respects_concurrency() {
        let peers: Vec<String> = (0..12).map(|i| format!("10.0.0.{}", i)).collect();
        let peer_refs: Vec<&str> = peers.iter().map(String::as_str).collect();
        let probe = Arc::new(PacedProbe::new(
            StaticProbe::new().with_neighbors("seed", &peer_refs),
            Duration::from_millis(20),
        ));

        let result = CrawlFrontier::new(probe.clone(), 1, 3).expand(&seeds(&["seed"])).await;

        assert_eq!(result.discovered.len(), 12);
        assert!(probe.peak() <= 3, "peak {} above the limit", probe.peak());
        assert!(probe.peak() > 1);
    }
}
