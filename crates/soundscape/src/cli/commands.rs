//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::sound::AudioQuality;
use crate::storage::{
    DEFAULT_LIST_LIMIT, DEFAULT_NEARBY_LIMIT, DEFAULT_RADIUS_KM, DEFAULT_SEARCH_LIMIT,
};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Sound name
    #[arg(short, long)]
    pub name: String,

    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,

    /// Emotion tag (repeatable)
    #[arg(short, long = "emotion")]
    pub emotions: Vec<String>,

    /// Free-form tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Kind of sound present (repeatable)
    #[arg(short = 's', long = "sound-type")]
    pub sound_types: Vec<String>,

    /// Who recorded it
    #[arg(short, long)]
    pub author: Option<String>,

    /// Free text description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Length in seconds
    #[arg(long, default_value = "0")]
    pub duration: u32,

    /// Recording quality
    #[arg(long, value_enum, default_value = "medium")]
    pub quality: QualityArg,

    /// Audio file to store with the sound
    #[arg(long, value_name = "FILE")]
    pub audio: Option<PathBuf>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: usize,

    /// Only sounds carrying this emotion
    #[arg(short, long)]
    pub emotion: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Sound id
    pub id: i64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Nearby command arguments.
#[derive(Debug, Args)]
pub struct NearbyCommand {
    /// Latitude of the center
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude of the center
    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,

    /// Radius in kilometres
    #[arg(short, long, default_value_t = DEFAULT_RADIUS_KM)]
    pub radius: f64,

    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_NEARBY_LIMIT)]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Text matched against name, description and tags
    pub query: Option<String>,

    /// Filter by emotion
    #[arg(short, long)]
    pub emotion: Option<String>,

    /// Filter by tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Filter by author
    #[arg(short, long)]
    pub author: Option<String>,

    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Tag command arguments.
#[derive(Debug, Args)]
pub struct TagCommand {
    /// Sound id
    pub id: i64,

    /// Tag to attach
    pub tag: String,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Sound id
    pub id: i64,
}

/// Analytics command arguments.
#[derive(Debug, Args)]
pub struct AnalyticsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Recommend command arguments.
#[derive(Debug, Args)]
pub struct RecommendCommand {
    /// Reference sound id
    pub id: i64,

    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Audio quality argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    /// AM radio grade
    Low,
    /// Compressed, around 128 kbps
    Medium,
    /// Compressed, around 320 kbps
    High,
    /// Lossless studio capture
    Professional,
}

impl From<QualityArg> for AudioQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => Self::Low,
            QualityArg::Medium => Self::Medium,
            QualityArg::High => Self::High,
            QualityArg::Professional => Self::Professional,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_arg_conversion() {
        assert_eq!(AudioQuality::from(QualityArg::Low), AudioQuality::Low);
        assert_eq!(AudioQuality::from(QualityArg::Medium), AudioQuality::Medium);
        assert_eq!(AudioQuality::from(QualityArg::High), AudioQuality::High);
        assert_eq!(
            AudioQuality::from(QualityArg::Professional),
            AudioQuality::Professional
        );
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
