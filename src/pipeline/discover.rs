//! Discovery: list categories and merge new posts into the link store.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use super::PipelineError;
use crate::source::{ContentSource, SortMode};
use crate::store::{LinkRecord, LinkStore, merge};

/// What a discovery run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverReport {
    /// Categories listed successfully.
    pub categories: usize,
    /// Posts returned across all listings.
    pub listed: usize,
    /// Records new to the store.
    pub added: usize,
    /// Categories whose listing failed.
    pub failed: usize,
}

/// Lists `categories` and merges the results into `store`.
///
/// Each listed post becomes a `new` record first seen on `today`; posts already
/// in the store keep their status. `delay` is slept between categories. A
/// failing category is logged and skipped unless the failure is fatal, in
/// which case the merge so far is saved and the error returned.
///
/// # Errors
///
/// Returns [`PipelineError`] on a fatal source error or when the store cannot
/// be saved.
#[instrument(skip(source, store, categories), fields(categories = categories.len()))]
pub async fn discover(
    source: &dyn ContentSource,
    store: &LinkStore,
    categories: &[String],
    sort: SortMode,
    limit: usize,
    delay: Duration,
    today: NaiveDate,
) -> Result<DiscoverReport, PipelineError> {
    let mut records = store.load();
    let before = records.len();
    let mut report = DiscoverReport::default();
    let mut fatal = None;

    for (index, category) in categories.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match source.list_posts(category, sort, limit).await {
            Ok(posts) => {
                report.categories += 1;
                report.listed += posts.len();
                info!(category = %category, posts = posts.len(), "category listed");
                let discovered = posts
                    .into_iter()
                    .map(|post| {
                        LinkRecord::discovered(post.id, post.title, post.url, today)
                            .with_subreddit(post.subreddit)
                    })
                    .collect();
                records = merge(records, discovered);
            }
            Err(e) if e.is_fatal() => {
                error!(category = %category, error = %e, "fatal source error, stopping discovery");
                fatal = Some(e);
                break;
            }
            Err(e) => {
                report.failed += 1;
                warn!(category = %category, error = %e, "listing failed, skipping category");
            }
        }
    }

    report.added = records.len() - before;
    let saved = store.save(&records);

    if let Some(e) = fatal {
        if let Err(save_error) = saved {
            error!(error = %save_error, "failed to save link store");
        }
        return Err(e.into());
    }
    saved?;

    info!(
        added = report.added,
        total = records.len(),
        "discovery complete"
    );
    Ok(report)
}
