//! # Configuration Module
//!
//! This module handles configuration management and data directory setup for
//! Muse ML. It provides the platform-appropriate location of the model
//! snapshot and the knobs an engine is constructed with.
//!
//! ## Data Storage
//!
//! The model snapshot lives in the platform-standard data directory:
//! - Linux: `~/.local/share/muse-ml/ml_model.json`
//! - macOS: `~/Library/Application Support/muse-ml/ml_model.json`
//! - Windows: `%APPDATA%\muse-ml\ml_model.json`
//!
//! Hosts that manage their own storage pass an explicit path instead.

use crate::clustering::DEFAULT_CLUSTERS;
use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the model snapshot inside the data directory.
pub const MODEL_FILE_NAME: &str = "ml_model.json";

/// Returns the platform-appropriate data directory for Muse ML.
///
/// The `muse-ml` subdirectory is created if it does not exist yet.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The muse-ml subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let muse_dir = data_dir.join("muse-ml");
    fs::create_dir_all(&muse_dir).with_context(|| {
        format!(
            "Failed to create Muse ML data directory at {}. Please check file permissions.",
            muse_dir.display()
        )
    })?;

    Ok(muse_dir)
}

/// Returns the default model snapshot path inside [`get_data_dir`].
///
/// # Errors
///
/// Fails under the same conditions as [`get_data_dir`].
///
/// # Examples
///
/// ```no_run
/// use muse_ml::config::get_model_path;
///
/// let model_path = get_model_path()?;
/// println!("Model location: {}", model_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_model_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(MODEL_FILE_NAME))
}

/// Make a user supplied path absolute against the current directory.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn absolutize_path(path: &Path) -> Result<PathBuf> {
    let absolute = path
        .absolutize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?;
    Ok(absolute.into_owned())
}

/// Construction parameters for a [`crate::engine::RecommendationEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Snapshot file; `None` keeps the model in memory only.
    pub model_path: Option<PathBuf>,
    /// Number of k-means clusters.
    pub n_clusters: usize,
    /// Seed for centroid sampling; `None` draws from system entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: get_model_path().ok(),
            n_clusters: DEFAULT_CLUSTERS,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Configuration backed by the default model path.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            model_path: Some(get_model_path()?),
            ..Self::in_memory()
        })
    }

    /// Configuration with an explicit snapshot path.
    #[must_use]
    pub fn with_model_path(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: Some(model_path.into()),
            ..Self::in_memory()
        }
    }

    /// Configuration that never touches the filesystem.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            model_path: None,
            n_clusters: DEFAULT_CLUSTERS,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }
}
