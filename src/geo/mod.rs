//! Geolocation Resolver
//!
//! Resolves an approximate location for a node address through an external
//! JSON lookup service (`GET <base>/<address>`). The service is loose about
//! types: coordinates may arrive as numbers, numeric strings, empty strings
//! or markers like `"nil"`. Non-numeric coordinates are read as `0.0`.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::Metrics;
use crate::config::MapperConfig;
use crate::probe::ProbeError;
use crate::types::GeoLocation;

/// Location lookup for a bare address
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// `None` when the service failed or had no data for the address
    async fn resolve_location(&self, address: &str) -> Option<GeoLocation>;
}

/// Resolver backed by a freegeoip-compatible HTTP service
pub struct HttpGeoResolver {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl HttpGeoResolver {
    pub fn new(config: &MapperConfig, metrics: Arc<Metrics>) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            client,
            base_url: config.geo_base_url.trim_end_matches('/').to_string(),
            timeout: config.geo_timeout(),
            metrics,
        })
    }

    async fn lookup(&self, address: &str) -> Result<serde_json::Value, ProbeError> {
        let url = format!("{}/{}", self.base_url, address);
        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ProbeError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn resolve_location(&self, address: &str) -> Option<GeoLocation> {
        let location = match self.lookup(address).await {
            Ok(payload) => location_from_payload(&payload),
            Err(e) => {
                debug!("Geolocation of {} failed ({}): {}", address, e.kind(), e);
                None
            }
        };

        self.metrics.record_geo_lookup(location.is_some());
        location
    }
}

/// Build a location from a lookup payload
///
/// Returns `None` when there is no country and both coordinates are zero.
pub fn location_from_payload(payload: &serde_json::Value) -> Option<GeoLocation> {
    let lat = coerce_coordinate(payload.get("latitude"));
    let lng = coerce_coordinate(payload.get("longitude"));

    let country = text_field(payload, "country")
        .or_else(|| text_field(payload, "country_name"))
        .unwrap_or_default();
    let city = text_field(payload, "city").unwrap_or_default();

    if country.is_empty() && lat == 0.0 && lng == 0.0 {
        return None;
    }

    Some(GeoLocation {
        lat: Some(lat),
        lng: Some(lng),
        country,
        city,
    })
}

/// Numbers and numeric strings are taken as-is, anything else is `0.0`
fn coerce_coordinate(value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Addresses that are never worth sending to the lookup service
///
/// Private, loopback, link-local and unspecified IPs. Host names are never
/// considered known-private.
pub fn is_known_private(address: &str) -> bool {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
        }
        Ok(IpAddr::V6(ip)) => {
            let first = ip.segments()[0];
            ip.is_loopback()
                || ip.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
        Err(_) => false,
    }
}
