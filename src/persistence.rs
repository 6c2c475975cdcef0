//! # Model Persistence
//!
//! The learned model lives in a single JSON file:
//!
//! ```json
//! {"version": 1, "is_trained": true, "scorer": {...}, "clustering": {...}}
//! ```
//!
//! Snapshots written before versioning have no `version` field and are read
//! as version 1. Every nested field tolerates absence or a malformed value.
//!
//! Storage is best effort. Callers get a [`StorageStatus`] instead of an
//! error so a full disk never blocks training or scoring.

use crate::clustering::Clustering;
use crate::scorer::Scorer;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Snapshot schema version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable form of a trained engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(default = "legacy_version", deserialize_with = "lenient_version")]
    pub version: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub is_trained: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub scorer: Scorer,
    #[serde(default, deserialize_with = "lenient")]
    pub clustering: Clustering,
}

impl ModelSnapshot {
    #[must_use]
    pub fn new(is_trained: bool, scorer: Scorer, clustering: Clustering) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            is_trained,
            scorer,
            clustering,
        }
    }

    /// Whether this build understands the snapshot's schema.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.version <= SNAPSHOT_VERSION
    }
}

/// Outcome of the last interaction with the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStatus {
    /// The engine runs without a backing file.
    InMemory,
    /// Nothing has touched the file yet.
    Idle,
    Loaded,
    Saved,
    Removed,
    /// No snapshot file exists.
    Missing,
    /// Storage failed; the in-memory model is still usable.
    Failed(String),
}

impl StorageStatus {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::Idle => write!(f, "idle"),
            Self::Loaded => write!(f, "loaded"),
            Self::Saved => write!(f, "saved"),
            Self::Removed => write!(f, "removed"),
            Self::Missing => write!(f, "missing"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Read the snapshot at `path`. `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON object.
pub fn load_snapshot(path: &Path) -> Result<Option<ModelSnapshot>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("No model snapshot at {}", path.display());
            return Ok(None);
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read model snapshot {}", path.display()))
        }
    };

    let snapshot: ModelSnapshot = serde_json::from_str(&contents)
        .with_context(|| format!("Corrupt model snapshot at {}", path.display()))?;
    debug!("Loaded model snapshot v{} from {}", snapshot.version, path.display());
    Ok(Some(snapshot))
}

/// Write `snapshot` to `path`, creating parent directories as needed.
///
/// The JSON goes to a temporary file next to `path` first and is renamed
/// into place, so a crash mid-write leaves the previous snapshot intact.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written or renamed.
pub fn save_snapshot(path: &Path, snapshot: &ModelSnapshot) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create model directory {}", dir.display()))?;

    let json = serde_json::to_vec(snapshot).context("Failed to serialize model snapshot")?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(&json)
        .context("Failed to write model snapshot")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move model snapshot into {}", path.display()))?;

    debug!("Saved model snapshot to {}", path.display());
    Ok(())
}

/// Delete the snapshot at `path`. Returns whether a file was removed.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove_snapshot(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err)
            .with_context(|| format!("Failed to remove model snapshot {}", path.display())),
    }
}

/// Deserialize a field, falling back to its default when the stored value
/// has the wrong shape.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        warn!("Ignoring malformed snapshot field: {err}");
        T::default()
    }))
}

const fn legacy_version() -> u32 {
    1
}

fn lenient_version<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|_| legacy_version()))
}
