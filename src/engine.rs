//! # Recommendation Engine
//!
//! Owns one [`Scorer`], one [`Clustering`] model and the window of recent
//! recommendations, and drives the training lifecycle:
//!
//! ```text
//! Uninitialized --train--> Trained --reset--> Uninitialized
//! ```
//!
//! Training fits fresh copies of both models and swaps them in only when the
//! whole fit succeeded, so a rejected batch never disturbs a trained model.
//! Every successful train writes a snapshot; construction reads it back.
//!
//! The engine is a plain single-owner object. Hosts that call it from
//! several threads wrap it in a `Mutex`.

use crate::clustering::Clustering;
use crate::config::EngineConfig;
use crate::features::{FeatureVector, HistoryEntry, COMPLETION_RATE, PLAY_FREQUENCY, SKIP_RATE};
use crate::math::{confidence_score, ConfidenceWeights};
use crate::persistence::{self, ModelSnapshot, StorageStatus};
use crate::scorer::Scorer;
use anyhow::{bail, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Smallest history that produces a meaningful variance.
pub const MIN_TRAINING_SAMPLES: usize = 5;

/// Capacity of the recent-recommendation window.
pub const RECENT_CAPACITY: usize = 50;

/// Trailing window entries handed to the diversity penalty.
pub const DIVERSITY_CONTEXT: usize = 10;

/// Score (0–100) reported while untrained.
pub const UNTRAINED_SCORE: f64 = 50.0;

const CONFIDENCE_FLOOR: f64 = 0.3;
const CONFIDENCE_CEILING: f64 = 0.95;

// Stand-ins for leading dimensions a short vector does not carry.
const DEFAULT_PLAY_FREQUENCY: f64 = 0.5;
const DEFAULT_COMPLETION_RATE: f64 = 0.5;
const DEFAULT_SKIP_RATE: f64 = 0.0;

/// Training batch below [`MIN_TRAINING_SAMPLES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientData {
    pub supplied: usize,
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Insufficient training data (need at least {MIN_TRAINING_SAMPLES} samples)"
        )
    }
}

impl std::error::Error for InsufficientData {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Trained,
}

/// Result of a successful [`RecommendationEngine::train`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainReport {
    pub samples_trained: usize,
    /// Whether the new model reached disk.
    pub storage: StorageStatus,
}

/// Score and side signals for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation {
    /// Relevance on a 0–100 scale.
    pub score: f64,
    /// Implicit-feedback confidence in `[0.3, 0.95]`.
    pub confidence: f64,
    /// Nearest cluster; `None` while untrained.
    pub cluster: Option<usize>,
    pub diversity_score: f64,
}

impl Recommendation {
    /// Neutral answer for users without a trained model.
    #[must_use]
    pub const fn untrained() -> Self {
        Self {
            score: UNTRAINED_SCORE,
            confidence: CONFIDENCE_FLOOR,
            cluster: None,
            diversity_score: 1.0,
        }
    }

    #[must_use]
    pub const fn is_personalized(&self) -> bool {
        self.cluster.is_some()
    }
}

/// Read-only view of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub is_trained: bool,
    #[serde(rename = "has_scorer")]
    pub has_profile: bool,
    #[serde(rename = "n_clusters")]
    pub cluster_count: usize,
}

#[derive(Debug)]
pub struct RecommendationEngine {
    config: EngineConfig,
    state: EngineState,
    scorer: Scorer,
    clustering: Clustering,
    recent: VecDeque<FeatureVector>,
    storage: StorageStatus,
}

impl RecommendationEngine {
    /// Build an engine and restore the snapshot named by `config`, if any.
    ///
    /// A missing, unreadable or corrupt snapshot leaves the engine
    /// untrained; construction itself never fails.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let mut engine = Self {
            scorer: Scorer::new(),
            clustering: fresh_clustering(&config),
            state: EngineState::Uninitialized,
            recent: VecDeque::with_capacity(RECENT_CAPACITY + 1),
            storage: if config.model_path.is_some() {
                StorageStatus::Idle
            } else {
                StorageStatus::InMemory
            },
            config,
        };
        engine.restore();
        engine
    }

    /// Engine without a backing file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(EngineConfig::in_memory())
    }

    fn restore(&mut self) {
        let Some(path) = self.config.model_path.clone() else {
            return;
        };

        self.storage = match persistence::load_snapshot(&path) {
            Ok(Some(snapshot)) if snapshot.is_supported() => {
                self.state = if snapshot.is_trained {
                    EngineState::Trained
                } else {
                    EngineState::Uninitialized
                };
                self.scorer = snapshot.scorer;
                self.clustering = snapshot.clustering;
                self.clustering.set_seed(self.config.seed);
                info!(
                    "Restored model from {} (trained: {})",
                    path.display(),
                    snapshot.is_trained
                );
                StorageStatus::Loaded
            }
            Ok(Some(snapshot)) => {
                let reason = format!(
                    "snapshot version {} is newer than supported version {}",
                    snapshot.version,
                    persistence::SNAPSHOT_VERSION
                );
                warn!("Ignoring model at {}: {reason}", path.display());
                StorageStatus::Failed(reason)
            }
            Ok(None) => StorageStatus::Missing,
            Err(err) => {
                warn!("Failed to load model: {err:#}");
                StorageStatus::Failed(format!("{err:#}"))
            }
        };
    }

    /// Fit scorer and clustering to `history`, then persist the model.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] for fewer than [`MIN_TRAINING_SAMPLES`]
    /// entries, and an error when an entry is empty or its length differs
    /// from the first entry. Prior trained state is untouched on error.
    /// Storage problems are reported in the [`TrainReport`], not as errors.
    pub fn train(&mut self, history: &[HistoryEntry]) -> Result<TrainReport> {
        if history.len() < MIN_TRAINING_SAMPLES {
            return Err(InsufficientData {
                supplied: history.len(),
            }
            .into());
        }

        let dims = history[0].features.len();
        if dims == 0 {
            bail!("training entries carry no features");
        }
        if let Some((i, entry)) = history
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.features.len() != dims)
        {
            bail!(
                "entry {i} has {} features, expected {dims}",
                entry.features.len()
            );
        }

        let features: Vec<FeatureVector> = history.iter().map(|e| e.features.clone()).collect();

        let mut scorer = self.scorer.clone();
        scorer.fit(&features);
        let mut clustering = self.clustering.clone();
        clustering.fit(&features);

        self.scorer = scorer;
        self.clustering = clustering;
        self.state = EngineState::Trained;
        info!("Trained model on {} samples of {dims} features", features.len());

        let storage = self.persist();
        Ok(TrainReport {
            samples_trained: history.len(),
            storage,
        })
    }

    /// Score one candidate and remember it for future diversity checks.
    ///
    /// Untrained engines return [`Recommendation::untrained`] and leave the
    /// window alone. Trained engines push `features` into the window on
    /// every call, evicting the oldest entry past [`RECENT_CAPACITY`].
    pub fn recommend(&mut self, features: &[f64]) -> Recommendation {
        if self.state == EngineState::Uninitialized {
            return Recommendation::untrained();
        }

        let window = self.recent.make_contiguous();
        let context = &window[window.len().saturating_sub(DIVERSITY_CONTEXT)..];
        let score = self.scorer.score_with_context(features, context) * 100.0;
        let cluster = self.clustering.predict_cluster(features);

        let play_frequency = features.get(PLAY_FREQUENCY).copied().unwrap_or(DEFAULT_PLAY_FREQUENCY);
        let completion = features.get(COMPLETION_RATE).copied().unwrap_or(DEFAULT_COMPLETION_RATE);
        let skip_rate = features.get(SKIP_RATE).copied().unwrap_or(DEFAULT_SKIP_RATE);

        // play frequency is normalized by 100 plays
        #[allow(clippy::cast_possible_truncation)]
        let play_count = (play_frequency * 100.0) as i64;
        let raw_confidence =
            confidence_score(completion, skip_rate, play_count, ConfidenceWeights::default());
        let confidence = if raw_confidence.is_nan() {
            CONFIDENCE_FLOOR
        } else {
            raw_confidence.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
        };

        self.recent.push_back(features.to_vec());
        while self.recent.len() > RECENT_CAPACITY {
            self.recent.pop_front();
        }

        debug!("Recommended score {score:.2} (cluster {cluster}, confidence {confidence:.2})");
        Recommendation {
            score,
            confidence,
            cluster: Some(cluster),
            diversity_score: 1.0 - 0.5 * skip_rate,
        }
    }

    /// Score a batch of candidates without diversity context, best first.
    ///
    /// Returns `(candidate index, score 0–100)` pairs. Does not touch the
    /// recent window.
    #[must_use]
    pub fn rank(&self, candidates: &[FeatureVector]) -> Vec<(usize, f64)> {
        let trained = self.is_trained();
        let mut ranked: Vec<(usize, f64)> = candidates
            .par_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let score = if trained {
                    self.scorer.score(candidate) * 100.0
                } else {
                    UNTRAINED_SCORE
                };
                (i, score)
            })
            .collect();

        ranked.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            is_trained: self.is_trained(),
            has_profile: self.scorer.is_trained(),
            cluster_count: self.clustering.n_clusters(),
        }
    }

    /// Forget everything: delete the snapshot and start untrained.
    ///
    /// The returned status reports the file deletion; the in-memory reset
    /// happens regardless.
    pub fn reset(&mut self) -> StorageStatus {
        let storage = match &self.config.model_path {
            Some(path) => match persistence::remove_snapshot(path) {
                Ok(true) => StorageStatus::Removed,
                Ok(false) => StorageStatus::Missing,
                Err(err) => {
                    warn!("Failed to remove model: {err:#}");
                    StorageStatus::Failed(format!("{err:#}"))
                }
            },
            None => StorageStatus::InMemory,
        };

        self.scorer = Scorer::new();
        self.clustering = fresh_clustering(&self.config);
        self.recent.clear();
        self.state = EngineState::Uninitialized;
        self.storage = storage.clone();
        info!("Model reset");
        storage
    }

    /// Current model as a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::new(self.is_trained(), self.scorer.clone(), self.clustering.clone())
    }

    fn persist(&mut self) -> StorageStatus {
        let status = match &self.config.model_path {
            Some(path) => match persistence::save_snapshot(path, &self.snapshot()) {
                Ok(()) => StorageStatus::Saved,
                Err(err) => {
                    warn!("Failed to save model: {err:#}");
                    StorageStatus::Failed(format!("{err:#}"))
                }
            },
            None => StorageStatus::InMemory,
        };
        self.storage = status.clone();
        status
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.state == EngineState::Trained
    }

    #[must_use]
    pub const fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    #[must_use]
    pub const fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recent recommendations, oldest first.
    #[must_use]
    pub const fn recent_recommendations(&self) -> &VecDeque<FeatureVector> {
        &self.recent
    }

    /// Outcome of the most recent load, save or delete.
    #[must_use]
    pub const fn last_storage_status(&self) -> &StorageStatus {
        &self.storage
    }
}

fn fresh_clustering(config: &EngineConfig) -> Clustering {
    match config.seed {
        Some(seed) => Clustering::with_seed(config.n_clusters, seed),
        None => Clustering::new(config.n_clusters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn history(n: usize) -> Vec<HistoryEntry> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f64 / n as f64;
                HistoryEntry::from(vec![t, 0.8 - t * 0.5, 0.1 + t * 0.2, 0.5, t, 0.4, 0.6, 0.1, 0.2])
            })
            .collect()
    }

    fn seeded_engine() -> RecommendationEngine {
        RecommendationEngine::new(EngineConfig::in_memory().with_seed(5))
    }

    #[test]
    fn test_untrained_engine_returns_neutral_default() {
        let mut engine = seeded_engine();
        let rec = engine.recommend(&[0.5; 9]);

        assert_eq!(rec, Recommendation::untrained());
        assert!(!rec.is_personalized());
        assert!(engine.recent_recommendations().is_empty());
    }

    #[test]
    fn test_train_rejects_small_batches() {
        let mut engine = seeded_engine();
        let err = engine.train(&history(4)).unwrap_err();

        assert!(err.downcast_ref::<InsufficientData>().is_some());
        assert!(err.to_string().starts_with("Insufficient training data"));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_train_then_recommend() {
        let mut engine = seeded_engine();
        let report = engine.train(&history(20)).expect("training should succeed");

        assert_eq!(report.samples_trained, 20);
        assert_eq!(report.storage, StorageStatus::InMemory);
        assert!(engine.is_trained());

        let rec = engine.recommend(&history(20)[7].features);
        assert!((0.0..=100.0).contains(&rec.score));
        assert!((CONFIDENCE_FLOOR..=CONFIDENCE_CEILING).contains(&rec.confidence));
        assert!(rec.cluster.unwrap() < 5);
        assert_eq!(engine.recent_recommendations().len(), 1);
    }

    #[test]
    fn test_ragged_batch_keeps_previous_model() {
        let mut engine = seeded_engine();
        engine.train(&history(10)).unwrap();
        let before = engine.snapshot();

        let mut ragged = history(10);
        ragged[6].features.push(0.9);
        let err = engine.train(&ragged).unwrap_err();

        assert!(err.to_string().contains("entry 6"));
        assert_eq!(engine.snapshot(), before);
        assert!(engine.is_trained());
    }

    #[test]
    fn test_empty_feature_vectors_are_rejected() {
        let mut engine = seeded_engine();
        let empty = vec![HistoryEntry::from(Vec::<f64>::new()); 6];
        assert!(engine.train(&empty).is_err());
        assert!(!engine.is_trained());
    }

    #[test]
    fn test_recent_window_is_bounded() {
        let mut engine = seeded_engine();
        engine.train(&history(10)).unwrap();

        for i in 0..=RECENT_CAPACITY {
            #[allow(clippy::cast_precision_loss)]
            let value = i as f64;
            engine.recommend(&[value; 9]);
        }

        let recent = engine.recent_recommendations();
        assert_eq!(recent.len(), RECENT_CAPACITY);
        assert_eq!(recent.front().unwrap()[0], 1.0);
        #[allow(clippy::cast_precision_loss)]
        let last = RECENT_CAPACITY as f64;
        assert_eq!(recent.back().unwrap()[0], last);
    }

    #[test]
    fn test_repeated_recommendation_lowers_score() {
        let mut engine = seeded_engine();
        engine.train(&history(10)).unwrap();
        let candidate = history(10)[4].features.clone();

        let first = engine.recommend(&candidate).score;
        let second = engine.recommend(&candidate).score;
        assert!(second < first);
    }

    #[test]
    fn test_short_vectors_use_defaults() {
        let mut engine = seeded_engine();
        engine.train(&history(10)).unwrap();

        let rec = engine.recommend(&[0.2]);
        assert_eq!(rec.diversity_score, 1.0);
        // completion 0.5, skip 0.0, 20 plays
        assert!((rec.confidence - (0.25 + 0.3 + 0.04)).abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_best_first() {
        let mut engine = seeded_engine();
        engine.train(&history(12)).unwrap();

        let candidates = vec![vec![9.0; 9], history(12)[6].features.clone(), vec![0.0; 9]];
        let ranked = engine.rank(&candidates);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, 1);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(engine.recent_recommendations().is_empty());
    }

    #[test]
    fn test_status_is_idempotent() {
        let engine = seeded_engine();
        let first = engine.status();
        assert_eq!(first, engine.status());
        assert_eq!(
            first,
            EngineStatus {
                is_trained: false,
                has_profile: false,
                cluster_count: 5
            }
        );
    }

    #[test]
    fn test_train_persists_and_new_engine_restores() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("ml_model.json");

        let mut engine = RecommendationEngine::new(EngineConfig::with_model_path(&path).with_seed(3));
        assert_eq!(engine.last_storage_status(), &StorageStatus::Missing);
        let report = engine.train(&history(15)).unwrap();
        assert_eq!(report.storage, StorageStatus::Saved);

        let restored = RecommendationEngine::new(EngineConfig::with_model_path(&path));
        assert_eq!(restored.last_storage_status(), &StorageStatus::Loaded);
        assert!(restored.is_trained());
        assert_eq!(restored.scorer().profile(), engine.scorer().profile());
        assert_eq!(restored.clustering().centroids(), engine.clustering().centroids());
    }

    #[test]
    fn test_storage_failure_keeps_model_usable() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut engine = RecommendationEngine::new(
            EngineConfig::with_model_path(blocker.join("ml_model.json")).with_seed(1),
        );
        let report = engine.train(&history(8)).expect("training should still succeed");

        assert!(report.storage.is_failure());
        assert!(engine.last_storage_status().is_failure());
        assert!(engine.recommend(&history(8)[2].features).is_personalized());
    }

    #[test]
    fn test_corrupt_snapshot_starts_untrained() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("ml_model.json");
        fs::write(&path, "garbage").unwrap();

        let engine = RecommendationEngine::new(EngineConfig::with_model_path(&path));
        assert!(!engine.is_trained());
        assert!(engine.last_storage_status().is_failure());
    }

    #[test]
    fn test_newer_snapshot_version_is_ignored() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("ml_model.json");
        fs::write(&path, r#"{"version": 2, "is_trained": true}"#).unwrap();

        let engine = RecommendationEngine::new(EngineConfig::with_model_path(&path));
        assert!(!engine.is_trained());
    }

    #[test]
    fn test_reset_deletes_snapshot_and_state() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("ml_model.json");

        let mut engine = RecommendationEngine::new(EngineConfig::with_model_path(&path).with_seed(9));
        engine.train(&history(10)).unwrap();
        engine.recommend(&[0.3; 9]);
        assert!(path.exists());

        assert_eq!(engine.reset(), StorageStatus::Removed);
        assert!(!path.exists());
        assert!(!engine.is_trained());
        assert!(engine.recent_recommendations().is_empty());
        assert!(engine.clustering().centroids().is_empty());
        assert_eq!(engine.recommend(&[0.3; 9]), Recommendation::untrained());

        assert_eq!(engine.reset(), StorageStatus::Missing);
    }
}
