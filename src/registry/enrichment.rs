//! Enrichment of registry records
//!
//! Combines the probe results of one pass with the previously stored record.
//! The geolocation cache lives here: a stored location is reused until it is
//! older than the staleness window, which bounds lookups to roughly one per
//! address per window no matter how often the crawl runs.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

use crate::probe::version::parse_version;
use crate::types::{ConnectionStatus, GeoLocation, NodeInfo, NodeRecord, NodeType, ParsedVersion};

/// Outcome of the geolocation step for one address in one pass
#[derive(Debug, Clone, PartialEq)]
pub enum LocationLookup {
    /// Cached location still fresh; no lookup issued
    Skipped,

    /// Address is never geolocated
    KnownPrivate,

    /// Lookup issued and answered
    Resolved(GeoLocation),

    /// Lookup issued and produced nothing
    Failed,
}

/// Whether the location of `existing` must be fetched again at `now`
pub fn should_refresh_location(existing: Option<&NodeRecord>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match existing.and_then(|r| r.location_fetched_at) {
        Some(fetched_at) => now - fetched_at > max_age,
        None => true,
    }
}

/// Produce the record for `address` after a probe pass
pub fn merge(
    existing: Option<&NodeRecord>,
    address: &str,
    info: &NodeInfo,
    neighbors: &BTreeSet<String>,
    lookup: LocationLookup,
    now: DateTime<Utc>,
) -> NodeRecord {
    let node_type = if neighbors.is_empty() {
        NodeType::Private
    } else {
        NodeType::Public
    };

    let version = info
        .server_version
        .as_deref()
        .map(parse_version)
        .unwrap_or_else(ParsedVersion::default);

    let cached = existing.map(|r| (r.location.clone(), r.location_fetched_at));

    let (location, location_fetched_at) = match lookup {
        LocationLookup::Skipped => cached.unwrap_or((None, None)),
        LocationLookup::KnownPrivate => (Some(GeoLocation::private()), Some(now)),
        LocationLookup::Resolved(location) => (Some(location), Some(now)),
        LocationLookup::Failed => match cached {
            // A real location survives a failed refresh and stays eligible for retry
            Some((Some(previous), fetched_at)) if previous.is_resolved() => (Some(previous), fetched_at),
            _ => (Some(GeoLocation::unknown()), Some(now)),
        },
    };

    NodeRecord {
        address: address.to_string(),
        server_version: info.server_version.clone(),
        version,
        burn_block_height: info.burn_block_height,
        node_type,
        connection_status: ConnectionStatus::classify(info, neighbors.len()),
        location,
        location_fetched_at,
        last_seen: now,
    }
}

/// Apply a metadata-only refresh to a stored record
///
/// Used by the periodic rescan. Only an answered info probe changes the
/// record; classification and location are left as they are.
pub fn refresh_info(record: &mut NodeRecord, info: &NodeInfo, now: DateTime<Utc>) -> bool {
    if !info.is_known() {
        return false;
    }

    record.server_version = info.server_version.clone();
    record.version = info
        .server_version
        .as_deref()
        .map(parse_version)
        .unwrap_or_default();
    record.burn_block_height = info.burn_block_height;
    record.connection_status = ConnectionStatus::Api;
    record.last_seen = now;
    true
}
