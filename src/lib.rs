//! On-device music recommendation that learns from listening behavior.
//!
//! Core modules:
//! - [`engine`] - Training lifecycle, scoring and the recent-recommendation window
//! - [`scorer`] - Z-score / cosine relevance scoring against a user profile
//! - [`clustering`] - Minimal k-means song grouping
//! - [`math`] - Cosine similarity, time decay, skip penalty, confidence
//! - [`persistence`] - Versioned JSON model snapshots
//! - [`api`] - JSON request/response boundary for host applications
//!
//! ### Supporting Modules
//!
//! - [`features`] - Feature vector layout and weight table
//! - [`config`] - Data directory and engine configuration
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```
//! use muse_ml::config::EngineConfig;
//! use muse_ml::engine::RecommendationEngine;
//! use muse_ml::features::HistoryEntry;
//!
//! let mut engine = RecommendationEngine::new(EngineConfig::in_memory().with_seed(7));
//!
//! // Untrained engines answer with a neutral default
//! let neutral = engine.recommend(&[0.5; 14]);
//! assert_eq!(neutral.score, 50.0);
//!
//! let history: Vec<HistoryEntry> = (0..10)
//!     .map(|i| HistoryEntry::from(vec![f64::from(i) / 10.0; 14]))
//!     .collect();
//! let report = engine.train(&history)?;
//! assert_eq!(report.samples_trained, 10);
//!
//! let rec = engine.recommend(&[0.4; 14]);
//! assert!((0.0..=100.0).contains(&rec.score));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Host Integration
//!
//! Hosts talking across a language boundary use the JSON functions in
//! [`api`], passing the engine they constructed:
//!
//! ```no_run
//! use muse_ml::{api, config::EngineConfig, engine::RecommendationEngine};
//!
//! let mut engine = RecommendationEngine::new(EngineConfig::new()?);
//! let status = api::train_model(&mut engine, r#"[{"features": [0.1, 0.9, 0.0]}]"#);
//! println!("{status}");
//! println!("{}", api::get_recommendation(&mut engine, "[0.2, 0.8, 0.1]"));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Fallible internals return `anyhow::Result`. The engine and the JSON layer
//! fail soft: storage problems are reported as a
//! [`persistence::StorageStatus`], short or malformed input produces a
//! structured response, and an untrained model is a normal state with a
//! documented default answer.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod api;
pub mod cli;
pub mod clustering;
pub mod completion;
pub mod config;
pub mod engine;
pub mod features;
pub mod math;
pub mod persistence;
pub mod scorer;
