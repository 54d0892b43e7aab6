//! Status Reporter
//!
//! Persists the engine's current phase as a single JSON document that the
//! read API serves. Every write replaces the previous document; a missing or
//! unreadable document reads as [`StatusRecord::default`].

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::registry::StoreError;
use crate::types::StatusRecord;

/// Phases of the discovery cycle and the periodic rescan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    SeedExpansion,
    Scanning,
    Enriching,
    Persisting,
    PeriodicRescan,
    NoSeedsReachable,
    Failed,
}

impl ScanPhase {
    /// Whether a scan is in progress during this phase
    pub fn is_scanning(&self) -> bool {
        !matches!(self, ScanPhase::Idle | ScanPhase::NoSeedsReachable | ScanPhase::Failed)
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanPhase::Idle => "Idle",
            ScanPhase::SeedExpansion => "Discovering seed neighbors",
            ScanPhase::Scanning => "Scanning network",
            ScanPhase::Enriching => "Enriching nodes",
            ScanPhase::Persisting => "Saving results",
            ScanPhase::PeriodicRescan => "Refreshing node info",
            ScanPhase::NoSeedsReachable => "No seed nodes reachable",
            ScanPhase::Failed => "Scan failed",
        };
        f.write_str(label)
    }
}

/// File-backed status document
pub struct StatusReporter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StatusReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Write the status for `phase`
    pub async fn report(
        &self,
        phase: ScanPhase,
        nodes_count: usize,
        last_scan: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let record = StatusRecord {
            status: phase.to_string(),
            nodes_count,
            scanning: phase.is_scanning(),
            last_scan,
            timestamp: Some(Utc::now()),
        };
        self.write(&record).await
    }

    /// Replace the status document
    pub async fn write(&self, record: &StatusRecord) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await.map_err(io_error)?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(io_error)?;

        debug!("Status: {} ({} nodes)", record.status, record.nodes_count);
        Ok(())
    }

    /// Current status, or the default when none was written
    pub async fn read(&self) -> StatusRecord {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(_) => return StatusRecord::default(),
        };

        match serde_json::from_slice(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Unreadable status file {:?}: {}", self.path, e);
                StatusRecord::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_absent_status_is_default() {
        let dir = tempdir().unwrap();
        let reporter = StatusReporter::new(dir.path().join("status.json"));

        assert_eq!(reporter.read().await, StatusRecord::default());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let dir = tempdir().unwrap();
        let reporter = StatusReporter::new(dir.path().join("status.json"));
        let finished = Utc::now();

        reporter.report(ScanPhase::Scanning, 0, None).await.unwrap();
        let status = reporter.read().await;
        assert_eq!(status.status, "Scanning network");
        assert!(status.scanning);

        reporter.report(ScanPhase::Idle, 42, Some(finished)).await.unwrap();
        let status = reporter.read().await;
        assert_eq!(status.status, "Idle");
        assert!(!status.scanning);
        assert_eq!(status.nodes_count, 42);
        assert_eq!(status.last_scan, Some(finished));
        assert!(status.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_status_is_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, b"[]").unwrap();

        let reporter = StatusReporter::new(&path);
        assert_eq!(reporter.read().await, StatusRecord::default());
    }

    #[test]
    fn test_phase_flags() {
        assert!(ScanPhase::SeedExpansion.is_scanning());
        assert!(ScanPhase::PeriodicRescan.is_scanning());
        assert!(!ScanPhase::NoSeedsReachable.is_scanning());
        assert_eq!(ScanPhase::NoSeedsReachable.to_string(), "No seed nodes reachable");
    }
}
