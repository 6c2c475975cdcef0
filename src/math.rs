//! Vector math and implicit-feedback formulas.
//!
//! Everything here is a pure function over plain slices. None of these
//! functions fail: degenerate input maps to a documented neutral value.

use std::f64::consts::LN_2;

/// Default half-life, in days, for [`time_decay`].
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 23.0;

/// Blend weights for [`confidence_score`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    /// Weight of the completion rate.
    pub alpha: f64,
    /// Weight of the inverted skip rate.
    pub beta: f64,
    /// Weight of the saturated play count.
    pub gamma: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.3,
            gamma: 0.2,
        }
    }
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Behavioral features are non-negative, so a negative cosine carries no
/// meaning and is floored to zero. Vectors of different length, empty
/// vectors and zero-magnitude vectors all yield `0.0`.
///
/// # Examples
///
/// ```
/// use muse_ml::math::cosine_similarity;
///
/// assert_eq!(cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]), 1.0);
/// assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
/// ```
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let magnitude_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (magnitude_a * magnitude_b);
    if similarity.is_nan() {
        // inf / inf on huge inputs
        return 0.0;
    }
    similarity.clamp(0.0, 1.0)
}

/// Euclidean distance over the overlapping prefix of both vectors.
#[must_use]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Exponential relevance decay: `exp(-ln(2) / half_life * days_since)`.
///
/// ```
/// use muse_ml::math::time_decay;
///
/// assert_eq!(time_decay(0.0, 23.0), 1.0);
/// assert!((time_decay(23.0, 23.0) - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn time_decay(days_since: f64, half_life: f64) -> f64 {
    let lambda = LN_2 / half_life;
    (-lambda * days_since).exp()
}

/// Skip penalty `exp(-listen_time / total_duration)`.
///
/// Shorter listens give a bigger penalty. An unknown or non-positive
/// duration counts as fully skipped and returns the maximum penalty `1.0`.
#[must_use]
pub fn skip_penalty(listen_time: f64, total_duration: f64) -> f64 {
    if total_duration <= 0.0 {
        return 1.0;
    }
    (-listen_time / total_duration).exp()
}

/// Implicit-feedback confidence:
/// `α·completion + β·(1 − skip_rate) + γ·min(play_count / 100, 1)`.
///
/// Not clamped, callers decide on the bounds they need.
#[must_use]
pub fn confidence_score(
    completion_rate: f64,
    skip_rate: f64,
    play_count: i64,
    weights: ConfidenceWeights,
) -> f64 {
    // Play count saturates around 100 plays.
    #[allow(clippy::cast_precision_loss)]
    let normalized_plays = (play_count as f64 / 100.0).min(1.0);

    weights.alpha * completion_rate
        + weights.beta * (1.0 - skip_rate)
        + weights.gamma * normalized_plays
}
