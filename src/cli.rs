//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Muse ML using Clap
//! derive macros. Every command prints the same JSON document the library's
//! [`crate::api`] layer returns to an embedding host.
//!
//! ## Commands
//!
//! - `train`: Fit the model to a listening history file
//! - `recommend`: Score one feature vector
//! - `rank`: Score and sort a batch of candidate feature vectors
//! - `status`: Show whether a model is trained
//! - `reset`: Delete the stored model
//!
//! ## Examples
//!
//! ```bash
//! muse-ml train history.json
//! muse-ml recommend '[0.4, 0.9, 0.1, 0.7, 0.5, 0.6, 0.8, 0.1, 0.3, 0.5, 0.4, 0.6, 0.2, 0.5]'
//! muse-ml --model ./profile-b.json status
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
///
/// Global options pick the model file and the clustering seed; the
/// subcommand decides what to do with the model.
#[derive(Parser, Debug)]
#[command(name = "muse-ml")]
#[command(about = "Muse ML: offline music recommendation scoring")]
#[command(version)]
pub struct Args {
    /// Model snapshot file
    ///
    /// Defaults to `ml_model.json` in the platform data directory.
    #[arg(long, global = true, env = "MUSE_ML_MODEL", value_hint = clap::ValueHint::FilePath)]
    pub model: Option<PathBuf>,

    /// Seed for k-means centroid sampling
    ///
    /// Without a seed every training run samples different initial
    /// centroids.
    #[arg(long, global = true, env = "MUSE_ML_SEED")]
    pub seed: Option<u64>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the model on a listening history
    ///
    /// The file holds a JSON array of `{"features": [..]}` objects, one per
    /// listening event. At least 5 entries are required. The trained model
    /// is written to the model file.
    Train {
        /// History file, or `-` to read standard input
        #[arg(value_hint = clap::ValueHint::FilePath)]
        history: PathBuf,
    },

    /// Score a single song's feature vector
    ///
    /// Prints score (0-100), confidence, cluster and diversity score.
    Recommend {
        /// JSON array of feature values
        features: String,
    },

    /// Rank a batch of candidate feature vectors
    ///
    /// The file holds a JSON array of feature arrays. Candidates are scored
    /// without diversity context and printed best first.
    Rank {
        /// Candidates file, or `-` to read standard input
        #[arg(value_hint = clap::ValueHint::FilePath)]
        candidates: PathBuf,

        /// Only print the top N candidates
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show model status
    Status,

    /// Delete the stored model and start over untrained
    Reset,

    /// Generate shell completions
    ///
    /// Usage: muse-ml completion bash > ~/.local/share/bash-completion/completions/muse-ml
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_train_with_global_model() {
        let args = Args::try_parse_from(["muse-ml", "train", "history.json", "--model", "m.json"])
            .expect("arguments should parse");

        assert_eq!(args.model, Some(PathBuf::from("m.json")));
        match args.command {
            Command::Train { history } => assert_eq!(history, PathBuf::from("history.json")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rank_limit_and_seed() {
        let args = Args::try_parse_from(["muse-ml", "--seed", "42", "rank", "-", "-l", "3"])
            .expect("arguments should parse");

        assert_eq!(args.seed, Some(42));
        match args.command {
            Command::Rank { candidates, limit } => {
                assert_eq!(candidates, PathBuf::from("-"));
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
