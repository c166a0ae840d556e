//! CLI entry point for post-archiver.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info};

use post_archiver::config::{ConfigLayer, Settings, load_file_layer};
use post_archiver::download::{HttpClient, MediaDownloader};
use post_archiver::pipeline::{Pipeline, discover};
use post_archiver::source::RedditClient;
use post_archiver::store::{LinkStore, StoreSummary};

mod cli;

use cli::{Cli, Command};

/// Process outcome mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Everything succeeded (0).
    Success,
    /// Some items failed, some succeeded (2).
    Partial,
    /// Nothing succeeded, or a fatal error (1).
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Partial => ExitCode::from(2),
        }
    }
}

/// Maps completed and failed counts to the process exit outcome.
fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // .env may carry RUST_LOG as well as credentials
    let _ = dotenvy::dotenv();
    init_tracing(&cli);

    debug!(?cli, "CLI arguments parsed");

    match run(&cli).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            ProcessExit::Failure.into()
        }
    }
}

/// Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let file = load_file_layer(cli.config.as_deref()).context("failed to load configuration")?;
    let layer = cli.layer().over(ConfigLayer::from_env()).over(file);
    Settings::resolve(layer).context("invalid configuration")
}

fn build_source(settings: &Settings) -> Result<RedditClient> {
    RedditClient::new(
        &settings.user_agent,
        settings.credentials.clone(),
        settings.connect_timeout_secs,
        settings.read_timeout_secs,
    )
    .context("failed to set up Reddit client")
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

async fn run(cli: &Cli) -> Result<ProcessExit> {
    let settings = resolve_settings(cli)?;
    let store = LinkStore::new(&settings.store_path);
    let today = Local::now().date_naive();

    match &cli.command {
        Command::Status => {
            let summary = StoreSummary::of(&store.load());
            println!("store:      {}", store.path().display());
            println!("new:        {}", summary.new);
            println!("downloaded: {}", summary.downloaded);
            println!("total:      {}", summary.total());
            Ok(ProcessExit::Success)
        }
        Command::Discover(_) => {
            let source = build_source(&settings)?;
            info!(subreddits = ?settings.subreddits, sort = %settings.sort, "discovering posts");
            let report = discover(
                &source,
                &store,
                &settings.subreddits,
                settings.sort,
                settings.limit,
                settings.discover_delay,
                today,
            )
            .await
            .context("discovery failed")?;
            info!(
                listed = report.listed,
                added = report.added,
                failed = report.failed,
                "discovery finished"
            );
            Ok(determine_exit_outcome(report.categories, report.failed))
        }
        Command::Download(_) => {
            let source = build_source(&settings)?;
            let client =
                HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
            let downloader = MediaDownloader::with_client(settings.concurrency, client)?;
            let pipeline = Pipeline::new(Arc::new(source), downloader, &settings.output_root)
                .with_post_delay(settings.post_delay)
                .with_progress(progress_bar(cli.quiet));

            let report = pipeline.run(&store, today).await.context("download failed")?;
            info!(
                downloaded = report.downloaded,
                failed = report.failed,
                pending = report.pending,
                "download finished"
            );
            Ok(determine_exit_outcome(report.downloaded, report.failed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }
}
