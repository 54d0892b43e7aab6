//! HTTP API Module
//!
//! Read-only view of the node map: the registry snapshot, the engine status
//! and the crawler metrics.

mod routes;
mod metrics;

pub use routes::{router, run_api_server, ApiState};
pub use metrics::Metrics;
