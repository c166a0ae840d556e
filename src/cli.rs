//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use post_archiver::config::ConfigLayer;
use post_archiver::source::SortMode;

/// Incrementally archive Reddit posts, comment trees and media to Markdown.
///
/// `discover` adds posts to the link store; `download` archives every post
/// still marked `new`.
#[derive(Parser, Debug)]
#[command(name = "post-archiver")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/post-archiver/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Link store file (default: links_store.json)
    #[arg(long, value_name = "FILE", global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List subreddits and add new posts to the link store
    Discover(DiscoverArgs),
    /// Archive every post whose status is `new`
    Download(DownloadArgs),
    /// Show link store counts
    Status,
}

/// Options for `discover`.
#[derive(Args, Debug, Clone, Default)]
pub struct DiscoverArgs {
    /// Subreddit to list (repeatable)
    #[arg(short = 's', long = "subreddit", value_name = "NAME")]
    pub subreddits: Vec<String>,

    /// Listing order
    #[arg(long, value_enum)]
    pub sort: Option<SortMode>,

    /// Posts to list per subreddit (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub limit: Option<u16>,

    /// Delay between subreddits in milliseconds (max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: Option<u64>,
}

/// Options for `download`.
#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Archive root directory (default: downloaded_posts)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Maximum concurrent media downloads (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Delay between posts in milliseconds (max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: Option<u64>,
}

impl Cli {
    /// The configuration layer set by flags; unset flags leave keys empty.
    #[must_use]
    pub fn layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer {
            store_path: self.store.clone(),
            ..ConfigLayer::default()
        };
        match &self.command {
            Command::Discover(args) => {
                if !args.subreddits.is_empty() {
                    layer.subreddits = Some(args.subreddits.clone());
                }
                layer.sort = args.sort;
                layer.limit = args.limit.map(usize::from);
                layer.discover_delay_ms = args.delay_ms;
            }
            Command::Download(args) => {
                layer.output_root.clone_from(&args.output);
                layer.concurrency = args.concurrency.map(usize::from);
                layer.post_delay_ms = args.delay_ms;
            }
            Command::Status => {}
        }
        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_a_subcommand() {
        let result = Cli::try_parse_from(["post-archiver"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["post-archiver", "-v", "status"]).unwrap();
        assert_eq!(cli.verbose, 1);

        let cli = Cli::try_parse_from(["post-archiver", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["post-archiver", "status", "--verbose"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let cli = Cli::try_parse_from(["post-archiver", "-q", "status"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["post-archiver", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["post-archiver", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Cli::try_parse_from(["post-archiver", "status", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_discover_collects_repeated_subreddits() {
        let cli = Cli::try_parse_from([
            "post-archiver",
            "discover",
            "-s",
            "memes",
            "--subreddit",
            "pics",
            "--sort",
            "hot",
            "--limit",
            "25",
        ])
        .unwrap();

        let layer = cli.layer();
        assert_eq!(
            layer.subreddits,
            Some(vec!["memes".to_string(), "pics".to_string()])
        );
        assert_eq!(layer.sort, Some(SortMode::Hot));
        assert_eq!(layer.limit, Some(25));
        assert_eq!(layer.concurrency, None);
    }

    #[test]
    fn test_discover_sort_accepts_legacy_alias() {
        let cli =
            Cli::try_parse_from(["post-archiver", "discover", "--sort", "top_all"]).unwrap();
        assert_eq!(cli.layer().sort, Some(SortMode::TopAllTime));
    }

    #[test]
    fn test_discover_limit_range() {
        assert!(Cli::try_parse_from(["post-archiver", "discover", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["post-archiver", "discover", "--limit", "1001"]).is_err());
    }

    #[test]
    fn test_download_flags_map_to_layer() {
        let cli = Cli::try_parse_from([
            "post-archiver",
            "--store",
            "s.json",
            "download",
            "-o",
            "out",
            "-c",
            "20",
            "--delay-ms",
            "0",
        ])
        .unwrap();

        let layer = cli.layer();
        assert_eq!(layer.store_path, Some(PathBuf::from("s.json")));
        assert_eq!(layer.output_root, Some(PathBuf::from("out")));
        assert_eq!(layer.concurrency, Some(20));
        assert_eq!(layer.post_delay_ms, Some(0));
        assert_eq!(layer.subreddits, None);
    }

    #[test]
    fn test_download_concurrency_range() {
        let err = Cli::try_parse_from(["post-archiver", "download", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = Cli::try_parse_from(["post-archiver", "download", "-c", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_download_delay_over_max_rejected() {
        let err =
            Cli::try_parse_from(["post-archiver", "download", "--delay-ms", "60001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_status_layer_only_carries_globals() {
        let cli = Cli::try_parse_from(["post-archiver", "status"]).unwrap();
        assert_eq!(cli.layer(), ConfigLayer::default());
    }
}
