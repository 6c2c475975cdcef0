//! # Muse ML - Offline Music Recommendation
//!
//! Command-line front end for the on-device recommendation engine. Every
//! command loads the model snapshot, performs one operation and prints the
//! JSON response a host application would receive.
//!
//! ## Usage
//!
//! ```bash
//! # Train from a listening history
//! muse-ml train history.json
//!
//! # Score one song
//! muse-ml recommend '[0.4, 0.9, 0.1, 0.7, 0.5, 0.6, 0.8, 0.1, 0.3, 0.5, 0.4, 0.6, 0.2, 0.5]'
//!
//! # Rank candidates, best first
//! muse-ml rank candidates.json --limit 10
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use muse_ml::cli::{self, Args};
use muse_ml::config::{self, EngineConfig};
use muse_ml::engine::RecommendationEngine;
use muse_ml::features::FeatureVector;
use muse_ml::{api, completion};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Read a file, or standard input when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read standard input")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Build the engine configuration from global CLI options.
fn engine_config(args: &Args) -> Result<EngineConfig> {
    let mut engine_config = match &args.model {
        Some(path) => EngineConfig::with_model_path(config::absolutize_path(path)?),
        None => EngineConfig::new()?,
    };
    if let Some(seed) = args.seed {
        engine_config = engine_config.with_seed(seed);
    }
    Ok(engine_config)
}

/// Main entry point for Muse ML.
///
/// Initializes environment logger which can be controlled via `RUST_LOG`:
/// - `RUST_LOG=debug muse-ml train history.json` - Enable debug logging
/// - `RUST_LOG=muse_ml::clustering=trace muse-ml train history.json` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let cli::Command::Completion { shell } = &args.command {
        let mut cmd = Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let engine_config = engine_config(&args)?;
    debug!("Using engine configuration {engine_config:?}");
    let mut engine = RecommendationEngine::new(engine_config);

    match args.command {
        cli::Command::Train { history } => {
            info!("Training model from: {}", history.display());
            let history_json = read_input(&history)?;
            println!("{}", api::train_model(&mut engine, &history_json));
        }
        cli::Command::Recommend { features } => {
            println!("{}", api::get_recommendation(&mut engine, &features));
        }
        cli::Command::Rank { candidates, limit } => {
            let candidates_json = read_input(&candidates)?;
            let candidates: Vec<FeatureVector> = serde_json::from_str(&candidates_json)
                .context("Candidates must be a JSON array of feature arrays")?;

            let ranked: Vec<serde_json::Value> = engine
                .rank(&candidates)
                .into_iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(|(index, score)| serde_json::json!({"index": index, "score": score}))
                .collect();
            println!("{}", serde_json::Value::Array(ranked));
        }
        cli::Command::Status => {
            println!("{}", api::get_model_status(&engine));
        }
        cli::Command::Reset => {
            println!("{}", api::reset_model(&mut engine));
        }
        cli::Command::Completion { .. } => unreachable!("handled before engine construction"),
    }

    Ok(())
}
