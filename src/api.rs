//! JSON boundary for host applications.
//!
//! Each operation takes the engine handle the host created and a JSON
//! payload, and always answers with a JSON document. Malformed input, short
//! training batches and untrained models all produce a structured response;
//! nothing here returns an error or panics on bad input.
//!
//! | Operation            | Request                          | Response                                   |
//! |----------------------|----------------------------------|--------------------------------------------|
//! | [`train_model`]      | `[{"features": [f64, ..]}, ..]`  | `{success, samples_trained?, message}`     |
//! | [`get_recommendation`] | `[f64, ..]`                    | `{score, confidence, cluster, diversity_score, message}` |
//! | [`get_model_status`] | —                                | `{is_trained, has_scorer, n_clusters}`     |
//! | [`reset_model`]      | —                                | `{success, message}`                       |

use crate::engine::{EngineStatus, InsufficientData, Recommendation, RecommendationEngine};
use crate::features::{FeatureVector, HistoryEntry};
use crate::persistence::StorageStatus;
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_trained: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub score: f64,
    pub confidence: f64,
    /// `-1` while untrained or on failure.
    pub cluster: i64,
    pub diversity_score: f64,
    pub message: String,
}

impl RecommendationResponse {
    fn from_recommendation(rec: Recommendation, message: impl Into<String>) -> Self {
        Self {
            score: rec.score,
            confidence: rec.confidence,
            cluster: rec
                .cluster
                .and_then(|c| i64::try_from(c).ok())
                .unwrap_or(-1),
            diversity_score: rec.diversity_score,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}

/// Train from a JSON history array.
pub fn train(engine: &mut RecommendationEngine, history_json: &str) -> TrainResponse {
    let outcome = parse_history(history_json).and_then(|history| engine.train(&history));

    match outcome {
        Ok(report) => TrainResponse {
            success: true,
            samples_trained: Some(report.samples_trained),
            message: match report.storage {
                StorageStatus::Failed(reason) => {
                    format!("Training completed successfully (model kept in memory only: {reason})")
                }
                _ => "Training completed successfully".to_string(),
            },
        },
        Err(err) if err.downcast_ref::<InsufficientData>().is_some() => TrainResponse {
            success: false,
            samples_trained: None,
            message: err.to_string(),
        },
        Err(err) => {
            warn!("Training failed: {err:#}");
            TrainResponse {
                success: false,
                samples_trained: None,
                message: format!("Training failed: {err:#}"),
            }
        }
    }
}

/// Score a JSON feature array.
pub fn recommend(engine: &mut RecommendationEngine, features_json: &str) -> RecommendationResponse {
    if !engine.is_trained() {
        return RecommendationResponse::from_recommendation(
            Recommendation::untrained(),
            "Model not trained yet",
        );
    }

    match parse_features(features_json) {
        Ok(features) => RecommendationResponse::from_recommendation(
            engine.recommend(&features),
            "Recommendation generated successfully",
        ),
        Err(err) => {
            warn!("Recommendation failed: {err:#}");
            RecommendationResponse::from_recommendation(
                Recommendation::untrained(),
                format!("Recommendation failed: {err:#}"),
            )
        }
    }
}

#[must_use]
pub fn status(engine: &RecommendationEngine) -> EngineStatus {
    engine.status()
}

/// Reset the engine. Always succeeds; a snapshot that could not be deleted
/// is mentioned in the message.
pub fn reset(engine: &mut RecommendationEngine) -> ResetResponse {
    let message = match engine.reset() {
        StorageStatus::Failed(reason) => format!("Model reset (snapshot not removed: {reason})"),
        _ => "Model reset".to_string(),
    };
    ResetResponse {
        success: true,
        message,
    }
}

/// [`train`] with a serialized response.
pub fn train_model(engine: &mut RecommendationEngine, history_json: &str) -> String {
    to_json(&train(engine, history_json))
}

/// [`recommend`] with a serialized response.
pub fn get_recommendation(engine: &mut RecommendationEngine, features_json: &str) -> String {
    to_json(&recommend(engine, features_json))
}

/// [`status`] with a serialized response.
#[must_use]
pub fn get_model_status(engine: &RecommendationEngine) -> String {
    to_json(&status(engine))
}

/// [`reset`] with a serialized response.
pub fn reset_model(engine: &mut RecommendationEngine) -> String {
    to_json(&reset(engine))
}

fn parse_history(json: &str) -> Result<Vec<HistoryEntry>> {
    serde_json::from_str(json).context("Invalid training history")
}

fn parse_features(json: &str) -> Result<FeatureVector> {
    serde_json::from_str(json).context("Invalid feature vector")
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| {
        serde_json::json!({"success": false, "message": format!("Serialization failed: {err}")})
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::Value;

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(EngineConfig::in_memory().with_seed(21))
    }

    fn history_json(n: usize, value: f64) -> String {
        let entries: Vec<Value> = (0..n)
            .map(|_| serde_json::json!({"features": vec![value; 14]}))
            .collect();
        Value::Array(entries).to_string()
    }

    #[test]
    fn test_train_model_insufficient_data() {
        let mut engine = engine();
        let response: Value = serde_json::from_str(&train_model(&mut engine, &history_json(4, 0.1))).unwrap();

        assert_eq!(response["success"], false);
        assert!(response["message"]
            .as_str()
            .unwrap()
            .starts_with("Insufficient training data"));
        assert!(response.get("samples_trained").is_none());
    }

    #[test]
    fn test_train_model_success_shape() {
        let mut engine = engine();
        let response: Value = serde_json::from_str(&train_model(&mut engine, &history_json(6, 0.4))).unwrap();

        assert_eq!(response["success"], true);
        assert_eq!(response["samples_trained"], 6);
        assert_eq!(response["message"], "Training completed successfully");
    }

    #[test]
    fn test_train_model_malformed_json() {
        let mut engine = engine();
        let response = train(&mut engine, "[{\"feat\": 1}]");

        assert!(!response.success);
        assert!(response.message.starts_with("Training failed: Invalid training history"));
    }

    #[test]
    fn test_untrained_recommendation_skips_parsing() {
        let mut engine = engine();
        let response = recommend(&mut engine, "not json at all");

        assert_eq!(response.score, 50.0);
        assert_eq!(response.confidence, 0.3);
        assert_eq!(response.cluster, -1);
        assert_eq!(response.diversity_score, 1.0);
        assert_eq!(response.message, "Model not trained yet");
    }

    #[test]
    fn test_malformed_features_fail_soft() {
        let mut engine = engine();
        train(&mut engine, &history_json(5, 0.5));

        let response = recommend(&mut engine, "{\"features\": []}");
        assert_eq!(response.score, 50.0);
        assert_eq!(response.cluster, -1);
        assert!(response.message.starts_with("Recommendation failed"));
        assert!(engine.recent_recommendations().is_empty());
    }

    #[test]
    fn test_status_json_field_names() {
        let engine = engine();
        let response: Value = serde_json::from_str(&get_model_status(&engine)).unwrap();

        assert_eq!(response["is_trained"], false);
        assert_eq!(response["has_scorer"], false);
        assert_eq!(response["n_clusters"], 5);
    }

    #[test]
    fn test_reset_model_response() {
        let mut engine = engine();
        train(&mut engine, &history_json(5, 0.5));

        let response: Value = serde_json::from_str(&reset_model(&mut engine)).unwrap();
        assert_eq!(response["success"], true);
        assert_eq!(response["message"], "Model reset");
        assert!(!engine.is_trained());
    }
}
