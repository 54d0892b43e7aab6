//! In-memory probes shared by the unit tests

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::geo::GeoResolver;
use crate::probe::PeerProbe;
use crate::types::{GeoLocation, NodeInfo};

/// Peer probe answering from a fixed neighbor graph
#[derive(Default)]
pub struct StaticProbe {
    neighbors: HashMap<String, Vec<String>>,
    info: HashMap<String, NodeInfo>,
    neighbor_calls: Mutex<HashMap<String, usize>>,
    info_calls: Mutex<usize>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_neighbors(mut self, address: &str, peers: &[&str]) -> Self {
        self.neighbors
            .insert(address.to_string(), peers.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_info(mut self, address: &str, version: &str, height: u64) -> Self {
        self.info.insert(
            address.to_string(),
            NodeInfo {
                server_version: Some(version.to_string()),
                burn_block_height: Some(height),
            },
        );
        self
    }

    pub fn neighbor_calls(&self, address: &str) -> usize {
        self.neighbor_calls.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub fn info_calls(&self) -> usize {
        *self.info_calls.lock().unwrap()
    }
}

#[async_trait]
impl PeerProbe for StaticProbe {
    async fn fetch_neighbors(&self, address: &str) -> BTreeSet<String> {
        *self
            .neighbor_calls
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;

        self.neighbors
            .get(address)
            .map(|peers| peers.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn fetch_info(&self, address: &str) -> NodeInfo {
        *self.info_calls.lock().unwrap() += 1;
        self.info.get(address).cloned().unwrap_or_default()
    }
}

/// Slows every call of a [`StaticProbe`] down and records the peak number of
/// calls in flight at once
pub struct PacedProbe {
    inner: StaticProbe,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PacedProbe {
    pub fn new(inner: StaticProbe, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn paced<T>(&self, call: impl Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = call.await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl PeerProbe for PacedProbe {
    async fn fetch_neighbors(&self, address: &str) -> BTreeSet<String> {
        self.paced(self.inner.fetch_neighbors(address)).await
    }

    async fn fetch_info(&self, address: &str) -> NodeInfo {
        self.paced(self.inner.fetch_info(address)).await
    }
}

/// Geolocation answering from a fixed table, counting lookups
#[derive(Default)]
pub struct StaticGeo {
    locations: HashMap<String, GeoLocation>,
    lookups: Mutex<Vec<String>>,
}

impl StaticGeo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, address: &str, country: &str, lat: f64, lng: f64) -> Self {
        self.locations.insert(
            address.to_string(),
            GeoLocation {
                lat: Some(lat),
                lng: Some(lng),
                country: country.to_string(),
                city: String::new(),
            },
        );
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeoResolver for StaticGeo {
    async fn resolve_location(&self, address: &str) -> Option<GeoLocation> {
        self.lookups.lock().unwrap().push(address.to_string());
        self.locations.get(address).cloned()
    }
}
