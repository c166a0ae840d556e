//! Bounded concurrent downloader for a post's media references.
//!
//! The `MediaDownloader` coordinates downloads using a semaphore-based
//! concurrency control pattern. Every reference gets its own Tokio task; a task
//! failure is logged and recorded as an absent result, never propagated.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use post_archiver::download::{DownloadContext, MediaDownloader};
//! use post_archiver::media::extract;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = MediaDownloader::new(5)?;
//! let ctx = Arc::new(DownloadContext::new());
//! let refs = extract("look https://i.redd.it/abc123.jpg");
//! let results = downloader.download_all(refs, Path::new("./media_files"), &ctx).await;
//! println!("downloaded {} of {}", results.downloaded_count(), results.len());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::HttpClient;
use super::constants::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::error::DownloadError;
use crate::media::MediaRef;

/// Error type for downloader construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Per-run record of fetch URLs that have already been downloaded.
///
/// Shared by every task of every post in one run. A URL is claimed before it is
/// fetched, and the claim is released if the fetch fails, so concurrent tasks
/// never fetch the same URL twice and a failed URL may be tried again later in
/// the run. Memory only; nothing carries over between runs.
#[derive(Debug, Default)]
pub struct DownloadContext {
    seen: DashSet<String>,
}

impl DownloadContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url`; returns `false` when another task already has it.
    fn claim(&self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    fn release(&self, url: &str) {
        self.seen.remove(url);
    }

    /// Returns whether `url` has been claimed in this run.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Number of URLs claimed in this run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true when nothing has been claimed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Outcome of a `download_all` call: each reference mapped to its local file.
///
/// `None` means the fetch failed or the URL was already downloaded earlier in
/// the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadResults {
    paths: HashMap<MediaRef, Option<PathBuf>>,
}

impl DownloadResults {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for `media`.
    pub fn insert(&mut self, media: MediaRef, path: Option<PathBuf>) {
        self.paths.insert(media, path);
    }

    /// Returns the local path for `media` when it was downloaded.
    #[must_use]
    pub fn path_for(&self, media: &MediaRef) -> Option<&Path> {
        self.paths.get(media).and_then(Option::as_deref)
    }

    /// Number of references with a recorded outcome.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true when no outcomes are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of references that resolved to a local file.
    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.paths.values().filter(|path| path.is_some()).count()
    }

    /// Iterates over all recorded outcomes in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&MediaRef, Option<&Path>)> {
        self.paths
            .iter()
            .map(|(media, path)| (media, path.as_deref()))
    }
}

/// Concurrent media downloader bounded by a fixed-size worker pool.
///
/// # Concurrency Model
///
/// - Each reference runs in its own Tokio task
/// - A semaphore permit is acquired before starting each download
/// - Permits are released automatically when downloads complete (RAII)
/// - Results are collected as tasks finish; ordering carries no meaning
#[derive(Debug, Clone)]
pub struct MediaDownloader {
    client: HttpClient,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl MediaDownloader {
    /// Creates a downloader with its own default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        Self::with_client(concurrency, HttpClient::new())
    }

    /// Creates a downloader that reuses `client`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(client))]
    pub fn with_client(concurrency: usize, client: HttpClient) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating media downloader");

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every distinct reference in `refs` into `dest_dir`.
    ///
    /// `dest_dir` is created if missing. Individual failures (network, HTTP
    /// status, filesystem) are logged and recorded as `None`; they never abort
    /// the batch. Two references that derive the same filename write the same
    /// path, and whichever finishes last wins.
    #[instrument(skip(self, refs, dest_dir, ctx), fields(dest_dir = %dest_dir.display()))]
    pub async fn download_all<I>(
        &self,
        refs: I,
        dest_dir: &Path,
        ctx: &Arc<DownloadContext>,
    ) -> DownloadResults
    where
        I: IntoIterator<Item = MediaRef>,
    {
        let mut results = DownloadResults::new();
        let mut tasks = JoinSet::new();

        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            warn!(error = %e, "failed to create media directory");
        }

        for media in refs {
            if results.paths.contains_key(&media) {
                continue;
            }
            // Pre-record as absent so a panicked task still leaves an entry.
            results.insert(media.clone(), None);

            let downloader = self.clone();
            let dest_dir = dest_dir.to_path_buf();
            let ctx = Arc::clone(ctx);

            tasks.spawn(async move {
                let path = downloader.fetch_one(&media, &dest_dir, &ctx).await;
                (media, path)
            });
        }

        debug!(task_count = tasks.len(), "waiting for media downloads");

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((media, path)) => results.insert(media, path),
                // Task panics are logged but don't fail the batch.
                Err(e) => warn!(error = %e, "media download task panicked"),
            }
        }

        info!(
            downloaded = results.downloaded_count(),
            total = results.len(),
            "media downloads finished"
        );
        results
    }

    /// Downloads a single reference, e.g. a post's main media.
    #[instrument(skip(self, media, dest_dir, ctx), fields(media = %media, dest_dir = %dest_dir.display()))]
    pub async fn download_one(
        &self,
        media: &MediaRef,
        dest_dir: &Path,
        ctx: &Arc<DownloadContext>,
    ) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            warn!(error = %e, "failed to create media directory");
        }
        self.fetch_one(media, dest_dir, ctx).await
    }

    /// Acquires a pool slot and fetches `media`, never returning an error.
    async fn fetch_one(
        &self,
        media: &MediaRef,
        dest_dir: &Path,
        ctx: &DownloadContext,
    ) -> Option<PathBuf> {
        let resolved = media.resolve();

        if !ctx.claim(&resolved.fetch_url) {
            debug!(url = %resolved.fetch_url, "already downloaded in this run, skipping");
            return None;
        }

        let Ok(_permit) = self.semaphore.acquire().await else {
            warn!(media = %media, "download pool closed");
            ctx.release(&resolved.fetch_url);
            return None;
        };

        let local_path = dest_dir.join(&resolved.filename);
        match self
            .client
            .download_to_path(&resolved.fetch_url, &local_path)
            .await
        {
            Ok(bytes) => {
                info!(media = %media, path = %local_path.display(), bytes, "media downloaded");
                Some(local_path)
            }
            Err(e) => {
                log_failure(media, &e);
                ctx.release(&resolved.fetch_url);
                None
            }
        }
    }
}

impl Default for MediaDownloader {
    fn default() -> Self {
        Self {
            client: HttpClient::new(),
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

fn log_failure(media: &MediaRef, error: &DownloadError) {
    warn!(media = %media, error = %error, "media download failed");
}
