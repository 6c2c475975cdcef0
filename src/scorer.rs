//! Relevance scoring against a per-user statistical profile.
//!
//! ## Score pipeline
//!
//! ```text
//! similarity_i = 1 / (1 + |(x_i - mean_i) / std_i|)
//! weighted     = Σ w_i · similarity_i
//! blended      = 0.7 · weighted + 0.3 · cos(x, profile)     (same length only)
//! penalized    = blended · (1 - 0.5 · skip_rate)             (skip slot present)
//! score        = clamp(penalized, 0, 1)
//! ```
//!
//! `score_with_context` then scales the score down by up to 30% when the
//! candidate resembles the last few recommendations.

use crate::features::{FeatureVector, FeatureWeights, SKIP_RATE};
use crate::math::cosine_similarity;
use crate::persistence::lenient;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Score returned before any training.
pub const NEUTRAL_SCORE: f64 = 0.5;

const WEIGHTED_SHARE: f64 = 0.7;
const COSINE_SHARE: f64 = 0.3;
const MAX_SKIP_PENALTY: f64 = 0.5;
const MAX_DIVERSITY_PENALTY: f64 = 0.3;

/// How many trailing recent items the diversity penalty looks at.
pub const DIVERSITY_LOOKBACK: usize = 5;

/// Per-dimension statistics of a user's listening history.
///
/// `mean`, `std` and `profile_vector` always share one length. `std` never
/// holds zero: a dimension without variance gets `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub profile_vector: Vec<f64>,
}

impl UserProfile {
    /// Population mean and standard deviation over `history`.
    ///
    /// Dimensionality follows the first vector. Returns `None` for an empty
    /// history.
    #[must_use]
    pub fn from_history(history: &[FeatureVector]) -> Option<Self> {
        let dims = history.first()?.len();
        #[allow(clippy::cast_precision_loss)]
        let count = history.len() as f64;

        let (mean, std): (Vec<f64>, Vec<f64>) = (0..dims)
            .map(|d| {
                let values = history.iter().map(|h| h.get(d).copied().unwrap_or(0.0));
                let mean = values.clone().sum::<f64>() / count;
                let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count;
                let std = if variance > 0.0 { variance.sqrt() } else { 1.0 };
                (mean, std)
            })
            .unzip();

        Some(Self {
            profile_vector: mean.clone(),
            mean,
            std,
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.mean.len()
    }
}

/// Stored form of a [`Scorer`]; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorerState {
    #[serde(default, deserialize_with = "lenient")]
    pub user_mean: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "lenient")]
    pub user_std: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "lenient")]
    pub user_profile_vector: Option<Vec<f64>>,
}

/// Blended z-score / cosine scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScorerState", into = "ScorerState")]
pub struct Scorer {
    profile: Option<UserProfile>,
    weights: FeatureWeights,
}

impl Scorer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scorer with a custom weight table.
    #[must_use]
    pub fn with_weights(weights: FeatureWeights) -> Self {
        Self {
            profile: None,
            weights,
        }
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub const fn is_trained(&self) -> bool {
        self.profile.is_some()
    }

    /// Replace the profile with statistics over `history`.
    ///
    /// An empty history leaves the scorer untouched.
    pub fn fit(&mut self, history: &[FeatureVector]) {
        if let Some(profile) = UserProfile::from_history(history) {
            debug!(
                "Fitted user profile over {} vectors, {} dimensions",
                history.len(),
                profile.dimensions()
            );
            self.profile = Some(profile);
        }
    }

    /// Relevance of `features` in `[0, 1]`.
    ///
    /// Untrained scorers return [`NEUTRAL_SCORE`]. Candidates whose length
    /// differs from the profile are compared over the shared prefix and skip
    /// the cosine blend.
    #[must_use]
    pub fn score(&self, features: &[f64]) -> f64 {
        let Some(profile) = &self.profile else {
            return NEUTRAL_SCORE;
        };

        let similarities: Vec<f64> = features
            .iter()
            .zip(&profile.mean)
            .zip(&profile.std)
            .map(|((feature, mean), std)| {
                let z = if *std > 0.0 { ((feature - mean) / std).abs() } else { 0.0 };
                1.0 / (1.0 + z)
            })
            .collect();

        let weights = self.weights.resolve(similarities.len());
        let mut score: f64 = similarities.iter().zip(&weights).map(|(s, w)| s * w).sum();

        if features.len() == profile.profile_vector.len() {
            let cosine = cosine_similarity(features, &profile.profile_vector);
            score = WEIGHTED_SHARE * score + COSINE_SHARE * cosine;
        }

        if let Some(skip_rate) = features.get(SKIP_RATE) {
            score *= 1.0 - MAX_SKIP_PENALTY * skip_rate;
        }

        clamp_unit(score)
    }

    /// [`Scorer::score`] with a diversity penalty against `recent`.
    ///
    /// The penalty is the mean cosine similarity to the last
    /// [`DIVERSITY_LOOKBACK`] entries, scaled to at most 30%.
    #[must_use]
    pub fn score_with_context(&self, features: &[f64], recent: &[FeatureVector]) -> f64 {
        let base = self.score(features);
        if recent.is_empty() {
            return base;
        }

        let window = &recent[recent.len().saturating_sub(DIVERSITY_LOOKBACK)..];
        #[allow(clippy::cast_precision_loss)]
        let avg_similarity = window
            .iter()
            .map(|other| cosine_similarity(features, other))
            .sum::<f64>()
            / window.len() as f64;

        base * (1.0 - MAX_DIVERSITY_PENALTY * avg_similarity)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

impl From<ScorerState> for Scorer {
    fn from(state: ScorerState) -> Self {
        let profile = match (state.user_mean, state.user_std) {
            (Some(mean), Some(std)) if !mean.is_empty() && mean.len() == std.len() => {
                let profile_vector = match state.user_profile_vector {
                    Some(v) if v.len() == mean.len() => v,
                    Some(_) => {
                        warn!("Stored profile vector has wrong length, falling back to mean");
                        mean.clone()
                    }
                    None => mean.clone(),
                };
                Some(UserProfile {
                    mean,
                    std,
                    profile_vector,
                })
            }
            (Some(mean), Some(std)) if mean.len() != std.len() => {
                warn!(
                    "Discarding stored profile: {} means vs {} deviations",
                    mean.len(),
                    std.len()
                );
                None
            }
            _ => None,
        };

        Self {
            profile,
            weights: FeatureWeights::default(),
        }
    }
}

impl From<Scorer> for ScorerState {
    fn from(scorer: Scorer) -> Self {
        match scorer.profile {
            Some(profile) => Self {
                user_mean: Some(profile.mean),
                user_std: Some(profile.std),
                user_profile_vector: Some(profile.profile_vector),
            },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varied_history() -> Vec<FeatureVector> {
        (0..10)
            .map(|i| {
                let t = f64::from(i) / 10.0;
                vec![t, 1.0 - t, 0.1, 0.5, t * t, 0.3, 0.7, 0.2, 0.2, 0.6, 0.4, 0.5, 0.1, t]
            })
            .collect()
    }

    #[test]
    fn test_untrained_scorer_is_neutral() {
        let scorer = Scorer::new();
        assert_eq!(scorer.score(&[0.2; 14]), NEUTRAL_SCORE);
        assert!(!scorer.is_trained());
    }

    #[test]
    fn test_fit_empty_history_is_noop() {
        let mut scorer = Scorer::new();
        scorer.fit(&[]);
        assert!(scorer.profile().is_none());
    }

    #[test]
    fn test_fit_population_statistics() {
        let mut scorer = Scorer::new();
        scorer.fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]);

        let profile = scorer.profile().unwrap();
        assert_eq!(profile.mean, vec![2.0, 5.0]);
        // population std of [1, 3] is 1; zero variance falls back to 1.0
        assert_eq!(profile.std, vec![1.0, 1.0]);
        assert_eq!(profile.profile_vector, profile.mean);
    }

    #[test]
    fn test_fit_replaces_previous_profile() {
        let mut scorer = Scorer::new();
        scorer.fit(&[vec![0.0, 0.0]]);
        scorer.fit(&[vec![1.0, 1.0, 1.0]]);
        assert_eq!(scorer.profile().unwrap().dimensions(), 3);
    }

    #[test]
    fn test_identical_candidate_scores_high() {
        let mut scorer = Scorer::new();
        scorer.fit(&vec![vec![0.5; 14]; 5]);

        // every similarity is 1, cosine is 1, skip factor is 0.75
        let score = scorer.score(&[0.5; 14]);
        assert!((score - 0.75).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_score_bounded_for_arbitrary_input() {
        let mut scorer = Scorer::new();
        scorer.fit(&varied_history());

        let candidates: Vec<Vec<f64>> = vec![
            vec![],
            vec![0.3],
            vec![-50.0, 1e9, -3.0],
            vec![1e300; 14],
            vec![-1e300; 20],
            vec![0.0; 14],
            vec![2.0; 9],
        ];
        for candidate in candidates {
            let score = scorer.score(&candidate);
            assert!((0.0..=1.0).contains(&score), "{candidate:?} scored {score}");
        }
    }

    #[test]
    fn test_high_skip_rate_lowers_score() {
        let mut scorer = Scorer::new();
        scorer.fit(&varied_history());

        let mut liked = varied_history()[5].clone();
        let mut skipped = liked.clone();
        liked[SKIP_RATE] = 0.1;
        skipped[SKIP_RATE] = 0.9;
        assert!(scorer.score(&liked) > scorer.score(&skipped));
    }

    #[test]
    fn test_diversity_penalty() {
        let mut scorer = Scorer::new();
        scorer.fit(&varied_history());
        let candidate = varied_history()[3].clone();

        let base = scorer.score(&candidate);
        assert_eq!(scorer.score_with_context(&candidate, &[]), base);

        let duplicates = vec![candidate.clone(); 8];
        let penalized = scorer.score_with_context(&candidate, &duplicates);
        assert!((penalized - base * 0.7).abs() < 1e-9);

        // only the trailing five entries count
        let mut mixed = duplicates;
        mixed.extend(vec![vec![0.0; 14]; 5]);
        assert_eq!(scorer.score_with_context(&candidate, &mixed), base);
    }

    #[test]
    fn test_state_round_trip() {
        let mut scorer = Scorer::new();
        scorer.fit(&varied_history());

        let json = serde_json::to_string(&scorer).unwrap();
        let restored: Scorer = serde_json::from_str(&json).unwrap();
        let (a, b) = (scorer.profile().unwrap(), restored.profile().unwrap());
        for (x, y) in a.mean.iter().zip(&b.mean).chain(a.std.iter().zip(&b.std)) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_state_tolerates_missing_and_mismatched_fields() {
        let empty: Scorer = serde_json::from_str("{}").unwrap();
        assert!(!empty.is_trained());

        let nulls: Scorer =
            serde_json::from_str(r#"{"user_mean": null, "user_std": null, "user_profile_vector": null}"#)
                .unwrap();
        assert!(!nulls.is_trained());

        let mismatched: Scorer =
            serde_json::from_str(r#"{"user_mean": [0.1, 0.2], "user_std": [1.0]}"#).unwrap();
        assert!(!mismatched.is_trained());

        let no_vector: Scorer =
            serde_json::from_str(r#"{"user_mean": [0.1, 0.2], "user_std": [1.0, 1.0]}"#).unwrap();
        assert_eq!(no_vector.profile().unwrap().profile_vector, vec![0.1, 0.2]);
    }
}
