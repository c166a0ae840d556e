//! Archive pipeline: discovery and the download batch.
//!
//! A batch loads the link store, archives every `new` record in order, and
//! saves the store once at the end. Each archived post lands in
//! `<output_root>/<subreddit>/<post_id>/` as `<post_id>.md` plus a
//! `media_files/` directory.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use post_archiver::download::MediaDownloader;
//! use post_archiver::pipeline::Pipeline;
//! use post_archiver::source::RedditClient;
//! use post_archiver::store::LinkStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RedditClient::new("rust:example:v0.1", None, 10, 10)?;
//! let pipeline = Pipeline::new(Arc::new(source), MediaDownloader::new(5)?, "downloaded_posts");
//! let today = chrono::Local::now().date_naive();
//! let report = pipeline.run(&LinkStore::new("links_store.json"), today).await?;
//! println!("archived {} of {}", report.downloaded, report.pending);
//! # Ok(())
//! # }
//! ```

mod discover;
mod error;

pub use discover::{DiscoverReport, discover};
pub use error::PipelineError;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::ProgressBar;
use tracing::{debug, error, info, instrument, warn};

use crate::comments::{collect_media, walk};
use crate::download::{DownloadContext, MediaDownloader};
use crate::media::{MediaRef, sanitize_filename};
use crate::render::render_document;
use crate::source::ContentSource;
use crate::store::{LinkRecord, LinkStore};

/// Default pause between two posts of a batch.
pub const DEFAULT_POST_DELAY: Duration = Duration::from_secs(2);

/// Directory under each post folder holding its media.
pub const MEDIA_DIR_NAME: &str = "media_files";

/// Counts for one download batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records that were `new` when the batch started.
    pub pending: usize,
    /// Records archived and marked `downloaded`.
    pub downloaded: usize,
    /// Records that failed and stay `new`.
    pub failed: usize,
}

impl BatchReport {
    /// Returns true when every pending record was archived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.downloaded == self.pending
    }
}

/// Drives archiving of `new` records.
pub struct Pipeline {
    source: Arc<dyn ContentSource>,
    downloader: MediaDownloader,
    output_root: PathBuf,
    post_delay: Duration,
    progress: ProgressBar,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("output_root", &self.output_root)
            .field("post_delay", &self.post_delay)
            .field("concurrency", &self.downloader.concurrency())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline writing under `output_root`.
    #[must_use]
    pub fn new(
        source: Arc<dyn ContentSource>,
        downloader: MediaDownloader,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            downloader,
            output_root: output_root.into(),
            post_delay: DEFAULT_POST_DELAY,
            progress: ProgressBar::hidden(),
        }
    }

    /// Sets the pause between posts.
    #[must_use]
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    /// Reports per-post progress on `bar`.
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    /// Loads `store`, runs one batch, and saves the store exactly once.
    ///
    /// The store is saved even when the batch stops on a fatal error, so posts
    /// archived before the error keep their `downloaded` status.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the batch, or [`PipelineError::Store`]
    /// when saving fails.
    #[instrument(skip(self, store), fields(store = %store.path().display()))]
    pub async fn run(&self, store: &LinkStore, today: NaiveDate) -> Result<BatchReport, PipelineError> {
        let mut records = store.load();
        let outcome = self.run_batch(&mut records, today).await;
        let saved = store.save(&records);

        match outcome {
            Ok(report) => {
                saved?;
                Ok(report)
            }
            Err(e) => {
                if let Err(save_error) = saved {
                    error!(error = %save_error, "failed to save link store after fatal error");
                }
                Err(e)
            }
        }
    }

    /// Archives every `new` record of `records` in order, updating them in place.
    ///
    /// A failing record is logged and left `new`; the batch moves on. A fatal
    /// error stops the batch and is returned; records already archived keep
    /// their updated status.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`PipelineError`].
    pub async fn run_batch(
        &self,
        records: &mut [LinkRecord],
        today: NaiveDate,
    ) -> Result<BatchReport, PipelineError> {
        let mut report = BatchReport {
            pending: records.iter().filter(|r| r.is_new()).count(),
            ..BatchReport::default()
        };

        if report.pending == 0 {
            info!("no new posts to archive");
            return Ok(report);
        }
        info!(pending = report.pending, "archiving new posts");

        let ctx = Arc::new(DownloadContext::new());
        self.progress
            .set_length(u64::try_from(report.pending).unwrap_or(u64::MAX));

        for (index, record) in records.iter_mut().filter(|r| r.is_new()).enumerate() {
            if index > 0 && !self.post_delay.is_zero() {
                tokio::time::sleep(self.post_delay).await;
            }
            self.progress.set_message(record.id.clone());

            match self.process_post(record, &ctx).await {
                Ok(document) => {
                    record.mark_downloaded(today);
                    report.downloaded += 1;
                    info!(post_id = %record.id, path = %document.display(), "post archived");
                }
                Err(e) if e.is_fatal() => {
                    error!(post_id = %record.id, error = %e, "fatal error, stopping batch");
                    self.progress.abandon();
                    return Err(e);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(post_id = %record.id, error = %e, "failed to archive post");
                }
            }
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        info!(
            downloaded = report.downloaded,
            failed = report.failed,
            media_urls = ctx.len(),
            "batch complete"
        );
        Ok(report)
    }

    /// Fetches, downloads, renders and writes one post. Returns the document path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the post cannot be fetched or the output
    /// cannot be written. Media failures are not errors.
    #[instrument(skip(self, record, ctx), fields(post_id = %record.id))]
    pub async fn process_post(
        &self,
        record: &LinkRecord,
        ctx: &Arc<DownloadContext>,
    ) -> Result<PathBuf, PipelineError> {
        let post = self.source.fetch_post(&record.id).await?;

        let subreddit = if post.subreddit.is_empty() {
            record.subreddit.as_deref().unwrap_or("unknown")
        } else {
            post.subreddit.as_str()
        };
        let post_dir = self
            .output_root
            .join(sanitize_filename(subreddit))
            .join(sanitize_filename(&post.id));
        let media_dir = post_dir.join(MEDIA_DIR_NAME);
        tokio::fs::create_dir_all(&media_dir)
            .await
            .map_err(|e| PipelineError::io(&media_dir, e))?;

        let main_media = match MediaRef::from_post_url(&post.url) {
            Some(media) => self.downloader.download_one(&media, &media_dir, ctx).await,
            None => None,
        };

        let entries = walk(&post.comments);
        let refs = collect_media(&entries);
        debug!(comments = entries.len(), media = refs.len(), "comment tree flattened");
        let downloads = self.downloader.download_all(refs, &media_dir, ctx).await;

        let document = render_document(&post, main_media.as_deref(), &entries, &downloads, &post_dir);
        let document_path = post_dir.join(format!("{}.md", sanitize_filename(&post.id)));
        tokio::fs::write(&document_path, document)
            .await
            .map_err(|e| PipelineError::io(&document_path, e))?;

        Ok(document_path)
    }
}
