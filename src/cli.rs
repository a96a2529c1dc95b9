//! Command-line interface for SubTrends.
//!
//! Credentials and subreddit groups come from the environment (or an optional
//! TOML file); the flags here only choose what to run.

use crate::formatting::DEFAULT_SPLIT_LENGTH;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Daily Reddit news digests, summarized and translated by Claude.
///
/// # Examples
///
/// ```sh
/// # List configured groups (SUB_WORLD=news,worldnews ...)
/// subtrends groups
///
/// # Summarize two groups without the translation pass
/// subtrends news world tech --no-translate
///
/// # Pick the model used by default from now on
/// subtrends model claude-sonnet-4-5
///
/// # Show, then forget, the groups summarized so far
/// subtrends history
/// subtrends clear
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a TOML config file
    #[arg(short, long, env = "SUBTRENDS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured subreddit groups
    Groups,

    /// Fetch and summarize the last day of news for one or more groups
    News(NewsArgs),

    /// Show the preferred model, or set it when NAME is given
    Model {
        /// Model name, must start with "claude-"
        name: Option<String>,
    },

    /// Show the groups summarized recently
    History,

    /// Forget the summarized-groups history
    Clear,
}

#[derive(Args, Debug)]
pub struct NewsArgs {
    /// Group names (case-insensitive)
    #[arg(required_unless_present = "all")]
    pub groups: Vec<String>,

    /// Summarize every configured group
    #[arg(long, conflicts_with = "groups")]
    pub all: bool,

    /// Model for this run, overriding the stored preference
    #[arg(long)]
    pub model: Option<String>,

    /// Skip the translation pass
    #[arg(long)]
    pub no_translate: bool,

    /// Maximum characters per printed chunk
    #[arg(long, default_value_t = DEFAULT_SPLIT_LENGTH)]
    pub split: usize,

    /// Also write each digest to <DIR>/<group>_news_<date>.txt
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}
