//! Registry Storage (JSON file)
//!
//! The registry is persisted as a single JSON array of records. Saves write
//! a temporary file and rename it over the previous snapshot.
//!
//! Older deployments stored the version as a numeric `major/minor/patch/build`
//! decomposition. Such a file is not upgraded record by record: it is
//! discarded and the next crawl rebuilds every record, geolocation included.

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::NodeRegistry;
use crate::types::NodeRecord;

/// Fields of the legacy numeric version layout
const LEGACY_VERSION_FIELDS: [&str; 4] = ["major", "minor", "patch", "build"];

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether persisted records use the current schema
///
/// Samples the first record only and assumes the rest match. An empty list is
/// current.
pub fn schema_is_current(records: &[serde_json::Value]) -> bool {
    let Some(sample) = records.first() else {
        return true;
    };

    match sample.get("version").and_then(|v| v.as_object()) {
        Some(version) => !LEGACY_VERSION_FIELDS.iter().any(|f| version.contains_key(*f)),
        None => true,
    }
}

/// Decode one stored record, `None` when it cannot be read
///
/// A record in the legacy layout behind a current first record fails here
/// and is dropped alone. A location without a fetch time has an unknown age
/// and is dropped so the next pass looks it up again.
fn decode_record(value: serde_json::Value) -> Option<NodeRecord> {
    let address = value.get("address").and_then(|a| a.as_str()).unwrap_or("?").to_string();

    match serde_json::from_value::<NodeRecord>(value) {
        Ok(mut record) => {
            if record.location_fetched_at.is_none() {
                record.location = None;
            }
            Some(record)
        }
        Err(e) => {
            debug!("Skipping stored record {}: {}", address, e);
            None
        }
    }
}

/// File-backed registry snapshot
pub struct RegistryFile {
    path: PathBuf,

    /// Serializes writers inside this process
    write_lock: Mutex<()>,
}

impl RegistryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full registry
    ///
    /// A missing file is an empty registry. A legacy-schema file is treated
    /// as empty and will be overwritten by the next save.
    pub async fn load(&self) -> Result<NodeRegistry, StoreError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No registry at {:?}, starting empty", self.path);
                return Ok(NodeRegistry::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let raw: Vec<serde_json::Value> = serde_json::from_slice(&content).map_err(|e| self.json_error(e))?;

        if !schema_is_current(&raw) {
            warn!(
                "🔄 Registry at {:?} uses the legacy version schema, discarding {} records",
                self.path,
                raw.len()
            );
            return Ok(NodeRegistry::new());
        }

        let total = raw.len();
        let records: Vec<NodeRecord> = raw.into_iter().filter_map(decode_record).collect();

        if records.len() < total {
            warn!(
                "🔄 Dropped {} unreadable records from {:?}, they will be rediscovered",
                total - records.len(),
                self.path
            );
        }

        debug!("Loaded {} records from {:?}", records.len(), self.path);
        Ok(NodeRegistry::from_records(records))
    }

    /// Overwrite the snapshot with `registry`
    pub async fn save(&self, registry: &NodeRegistry) -> Result<(), StoreError> {
        let records: Vec<&NodeRecord> = registry.records().collect();
        let content = serde_json::to_vec_pretty(&records).map_err(|e| self.json_error(e))?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
            }
        }

        // Write file atomically (write to temp, then rename)
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| self.io_error(e))?;

        info!("💾 Saved {} nodes to {:?}", records.len(), self.path);
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn json_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Json {
            path: self.path.clone(),
            source,
        }
    }
}
