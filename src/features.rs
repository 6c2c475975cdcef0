//! Feature vector layout shared between the host application and the engine.
//!
//! The host extracts one vector per song (or listening event) and the engine
//! never looks at anything else. Dimension count and order are a contract:
//! the canonical layout has 14 slots, older hosts send only the first 9.

use serde::{Deserialize, Serialize};

/// Ordered, normalized behavioral signals for one song.
pub type FeatureVector = Vec<f64>;

pub const PLAY_FREQUENCY: usize = 0;
pub const COMPLETION_RATE: usize = 1;
pub const SKIP_RATE: usize = 2;

/// Number of dimensions in the canonical layout.
pub const CANONICAL_DIMENSIONS: usize = 14;

/// Human readable names of the canonical dimensions, in order.
pub const FEATURE_NAMES: [&str; CANONICAL_DIMENSIONS] = [
    "play_frequency",
    "avg_completion_rate",
    "skip_rate",
    "recency_score",
    "time_of_day_match",
    "genre_affinity",
    "artist_affinity",
    "consecutive_plays",
    "session_context",
    "duration_score",
    "album_affinity",
    "release_year_score",
    "song_popularity",
    "tempo_energy",
];

/// One past listening event as submitted for training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub features: FeatureVector,
}

impl From<FeatureVector> for HistoryEntry {
    fn from(features: FeatureVector) -> Self {
        Self { features }
    }
}

/// Hand-tuned per-dimension weights for z-score similarity.
///
/// Completion rate dominates since finishing a song is the strongest
/// engagement signal the host can observe. The canonical table sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureWeights {
    pub play_frequency: f64,
    pub completion_rate: f64,
    pub skip_rate: f64,
    pub recency: f64,
    pub time_of_day: f64,
    pub genre_affinity: f64,
    pub artist_affinity: f64,
    pub consecutive_plays: f64,
    pub session_context: f64,
    pub duration: f64,
    pub album_affinity: f64,
    pub release_year: f64,
    pub popularity: f64,
    pub tempo_energy: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            play_frequency: 0.10,
            completion_rate: 0.18,
            skip_rate: 0.12,
            recency: 0.10,
            time_of_day: 0.08,
            genre_affinity: 0.08,
            artist_affinity: 0.08,
            consecutive_plays: 0.04,
            session_context: 0.04,
            duration: 0.06,
            album_affinity: 0.05,
            release_year: 0.03,
            popularity: 0.02,
            tempo_energy: 0.02,
        }
    }
}

impl FeatureWeights {
    /// Weights in canonical dimension order.
    #[must_use]
    pub const fn table(&self) -> [f64; CANONICAL_DIMENSIONS] {
        [
            self.play_frequency,
            self.completion_rate,
            self.skip_rate,
            self.recency,
            self.time_of_day,
            self.genre_affinity,
            self.artist_affinity,
            self.consecutive_plays,
            self.session_context,
            self.duration,
            self.album_affinity,
            self.release_year,
            self.popularity,
            self.tempo_energy,
        ]
    }

    /// Weight table fitted to `dims` dimensions.
    ///
    /// Fewer dimensions truncate the table. Extra dimensions share the
    /// table's residual weight (`1 - sum`) equally.
    #[must_use]
    pub fn resolve(&self, dims: usize) -> Vec<f64> {
        let table = self.table();
        if dims <= table.len() {
            return table[..dims].to_vec();
        }

        let residual = 1.0 - table.iter().sum::<f64>();
        let extra = dims - table.len();
        #[allow(clippy::cast_precision_loss)]
        let share = residual / extra as f64;

        table
            .iter()
            .copied()
            .chain(std::iter::repeat(share).take(extra))
            .collect()
    }
}
