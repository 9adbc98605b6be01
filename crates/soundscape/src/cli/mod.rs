//! Command-line interface for soundscape.
//!
//! This module provides the CLI structure and output rendering for the
//! `soundscape` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, AnalyticsCommand, ClearCommand, ConfigCommand, DeleteCommand, ListCommand,
    NearbyCommand, OutputFormat, QualityArg, RecommendCommand, SearchCommand, ServeCommand,
    ShowCommand, StatsCommand, TagCommand,
};

/// soundscape - Archive and explore geotagged environmental sounds
///
/// Stores sound recordings with their location, mood and tags, serves them
/// over a JSON API, and summarizes the collection.
#[derive(Debug, Parser)]
#[command(name = "soundscape")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Add a sound
    Add(AddCommand),

    /// List recent sounds
    List(ListCommand),

    /// Show one sound
    Show(ShowCommand),

    /// Find sounds near a point
    Nearby(NearbyCommand),

    /// Search sounds by text, emotion, tag or author
    Search(SearchCommand),

    /// Attach a tag to a sound
    Tag(TagCommand),

    /// Delete a sound and its audio file
    Delete(DeleteCommand),

    /// Summarize the collection
    Analytics(AnalyticsCommand),

    /// Find sounds similar to another
    Recommend(RecommendCommand),

    /// Show database statistics
    Stats(StatsCommand),

    /// Insert the built-in sample sounds
    Seed,

    /// Delete every sound
    Clear(ClearCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "soundscape");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(
            parse(&["soundscape", "-q", "seed"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["soundscape", "seed"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["soundscape", "-v", "seed"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["soundscape", "-vv", "seed"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_serve() {
        let cli = parse(&["soundscape", "serve", "--bind", "0.0.0.0:8080"]);
        let Command::Serve(cmd) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:8080"));
    }

    #[test]
    fn test_parse_add_with_negative_coordinates() {
        let cli = parse(&[
            "soundscape",
            "add",
            "--name",
            "Amazon dawn",
            "--lat",
            "-4.2158",
            "--lng",
            "-69.2167",
            "-e",
            "relaxing",
            "-e",
            "peaceful",
            "--tag",
            "nature",
            "--quality",
            "high",
        ]);
        let Command::Add(cmd) = cli.command else {
            panic!("expected add");
        };
        assert!((cmd.lat - -4.2158).abs() < 1e-9);
        assert!((cmd.lng - -69.2167).abs() < 1e-9);
        assert_eq!(cmd.emotions, vec!["relaxing", "peaceful"]);
        assert_eq!(cmd.tags, vec!["nature"]);
        assert_eq!(cmd.quality, QualityArg::High);
        assert_eq!(cmd.duration, 0);
    }

    #[test]
    fn test_parse_list_defaults() {
        let Command::List(cmd) = parse(&["soundscape", "list"]).command else {
            panic!("expected list");
        };
        assert_eq!(cmd.limit, 100);
        assert_eq!(cmd.format, OutputFormat::Table);
    }

    #[test]
    fn test_parse_nearby_defaults() {
        let cli = parse(&["soundscape", "nearby", "--lat", "4.7", "--lng", "-74.0"]);
        let Command::Nearby(cmd) = cli.command else {
            panic!("expected nearby");
        };
        assert!((cmd.radius - 10.0).abs() < f64::EPSILON);
        assert_eq!(cmd.limit, 50);
    }

    #[test]
    fn test_parse_search_without_query() {
        let cli = parse(&["soundscape", "search", "--emotion", "calm", "-f", "json"]);
        let Command::Search(cmd) = cli.command else {
            panic!("expected search");
        };
        assert!(cmd.query.is_none());
        assert_eq!(cmd.emotion.as_deref(), Some("calm"));
        assert_eq!(cmd.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_tag_and_delete() {
        assert!(matches!(
            parse(&["soundscape", "tag", "3", "rain"]).command,
            Command::Tag(TagCommand { id: 3, .. })
        ));
        assert!(matches!(
            parse(&["soundscape", "delete", "7"]).command,
            Command::Delete(DeleteCommand { id: 7 })
        ));
    }

    #[test]
    fn test_parse_clear_requires_flag_for_confirmation() {
        let Command::Clear(cmd) = parse(&["soundscape", "clear"]).command else {
            panic!("expected clear");
        };
        assert!(!cmd.yes);
        let Command::Clear(cmd) = parse(&["soundscape", "clear", "--yes"]).command else {
            panic!("expected clear");
        };
        assert!(cmd.yes);
    }

    #[test]
    fn test_parse_config_subcommands() {
        assert!(matches!(
            parse(&["soundscape", "config", "path"]).command,
            Command::Config(ConfigCommand::Path)
        ));
        assert!(matches!(
            parse(&["soundscape", "config", "show", "--json"]).command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["soundscape", "-c", "/custom/config.toml", "stats"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["soundscape", "show", "abc"]).is_err());
    }
}
