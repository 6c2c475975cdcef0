//! Minimal k-means for grouping songs by listening behavior.
//!
//! Seeds `k` centroids by sampling training points without replacement and
//! then runs a fixed number of Lloyd iterations. There is no convergence
//! check, so the cost of a fit is bounded by `n * k * LLOYD_ITERATIONS`.

use crate::features::FeatureVector;
use crate::math::euclidean_distance;
use crate::persistence::lenient;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Deserializer, Serialize};

/// Cluster count used when none is configured or the stored one is unreadable.
pub const DEFAULT_CLUSTERS: usize = 5;

/// Lloyd iterations per fit.
pub const LLOYD_ITERATIONS: usize = 10;

/// k-means model with a fixed cluster count.
///
/// Serializes as `{"n_clusters": k, "centroids": [[..], ..]}`. The seed is
/// runtime configuration and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    #[serde(default = "default_n_clusters", deserialize_with = "lenient_n_clusters")]
    n_clusters: usize,
    #[serde(default, deserialize_with = "lenient")]
    centroids: Vec<FeatureVector>,
    #[serde(skip)]
    seed: Option<u64>,
}

impl Default for Clustering {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTERS)
    }
}

impl Clustering {
    /// Untrained model with `n_clusters` clusters, seeded from system entropy.
    #[must_use]
    pub const fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            centroids: Vec::new(),
            seed: None,
        }
    }

    /// Untrained model whose centroid seeding is reproducible.
    #[must_use]
    pub const fn with_seed(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            centroids: Vec::new(),
            seed: Some(seed),
        }
    }

    #[must_use]
    pub const fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    #[must_use]
    pub fn centroids(&self) -> &[FeatureVector] {
        &self.centroids
    }

    /// Replace the seed used by subsequent fits.
    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    /// Fit centroids to `points`, replacing any previous fit.
    ///
    /// With fewer points than clusters every point becomes its own centroid
    /// and no iteration runs. A centroid that attracts no points during an
    /// iteration keeps its previous position.
    pub fn fit(&mut self, points: &[FeatureVector]) {
        if points.len() < self.n_clusters {
            debug!(
                "Only {} points for {} clusters, using points as centroids",
                points.len(),
                self.n_clusters
            );
            self.centroids = points.to_vec();
            return;
        }

        let mut rng = self.rng();
        self.centroids = index::sample(&mut rng, points.len(), self.n_clusters)
            .into_iter()
            .map(|i| points[i].clone())
            .collect();

        for iteration in 0..LLOYD_ITERATIONS {
            let mut members: Vec<Vec<&FeatureVector>> = vec![Vec::new(); self.n_clusters];
            for point in points {
                if let Some(nearest) = nearest_centroid(point, &self.centroids) {
                    members[nearest].push(point);
                }
            }

            for (centroid, assigned) in self.centroids.iter_mut().zip(&members) {
                if !assigned.is_empty() {
                    *centroid = mean_of(assigned);
                }
            }
            trace!("k-means iteration {iteration} done");
        }

        debug!("Fitted {} centroids over {} points", self.centroids.len(), points.len());
    }

    /// Index of the nearest centroid, or `0` before any fit.
    #[must_use]
    pub fn predict_cluster(&self, point: &[f64]) -> usize {
        nearest_centroid(point, &self.centroids).unwrap_or(0)
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// First centroid at minimal Euclidean distance.
fn nearest_centroid(point: &[f64], centroids: &[FeatureVector]) -> Option<usize> {
    centroids
        .iter()
        .map(|centroid| euclidean_distance(point, centroid))
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((i, distance)),
        })
        .map(|(i, _)| i)
}

/// Coordinate-wise mean over the shared dimensions of `points`.
fn mean_of(points: &[&FeatureVector]) -> FeatureVector {
    let dims = points.iter().map(|p| p.len()).min().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let count = points.len() as f64;

    (0..dims)
        .map(|d| points.iter().map(|p| p[d]).sum::<f64>() / count)
        .collect()
}

const fn default_n_clusters() -> usize {
    DEFAULT_CLUSTERS
}

fn lenient_n_clusters<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or(DEFAULT_CLUSTERS))
}
