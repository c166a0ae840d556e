//! Content sources: where posts and their comment trees come from.
//!
//! - [`ContentSource`] - Async trait the pipeline drives
//! - [`RedditClient`] - Reddit JSON API implementation, anonymous or app-only OAuth
//! - [`SortMode`] - Listing order used during discovery

mod error;
mod reddit;

pub use error::SourceError;
pub use reddit::{Credentials, RedditClient};

use std::fmt;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::comments::CommentNode;

/// Base of canonical post links.
pub const CANONICAL_BASE: &str = "https://www.reddit.com";

/// Listing order for discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Currently trending posts.
    Hot,
    /// Highest scoring posts of all time.
    #[default]
    #[serde(alias = "top_all")]
    #[value(alias = "top_all", alias = "top_all_time")]
    TopAllTime,
}

impl SortMode {
    /// Listing path segment and optional time window.
    #[must_use]
    pub fn listing(&self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::Hot => ("hot", None),
            Self::TopAllTime => ("top", Some("all")),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hot => write!(f, "hot"),
            Self::TopAllTime => write!(f, "top_all_time"),
        }
    }
}

/// A post as seen in a category listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    /// Stable post id.
    pub id: String,
    /// Post title.
    pub title: String,
    /// Canonical post URL.
    pub url: String,
    /// Category the post belongs to.
    pub subreddit: String,
}

/// A fully fetched post with its comment tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetails {
    /// Stable post id.
    pub id: String,
    /// Post title.
    pub title: String,
    /// Author name, `None` when deleted.
    pub author: Option<String>,
    /// Net score.
    pub score: i64,
    /// Self-text; empty for link posts.
    pub body: String,
    /// The post's own link (image, external page, or the post itself).
    pub url: String,
    /// Site-relative permalink, e.g. `/r/memes/comments/abc/title/`.
    pub permalink: String,
    /// Category the post belongs to.
    pub subreddit: String,
    /// Top-level comments in source order.
    pub comments: Vec<CommentNode>,
}

impl PostDetails {
    /// Absolute link to the post's discussion page.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        if self.permalink.starts_with("http") {
            self.permalink.clone()
        } else {
            format!("{CANONICAL_BASE}{}", self.permalink)
        }
    }
}

/// A platform that can list posts and fetch them with their comments.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Lists up to `limit` posts of `category` in `sort` order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the listing cannot be fetched or parsed.
    async fn list_posts(
        &self,
        category: &str,
        sort: SortMode,
        limit: usize,
    ) -> Result<Vec<PostSummary>, SourceError>;

    /// Fetches a post and its full comment tree by id or post URL.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the post cannot be fetched or parsed.
    async fn fetch_post(&self, id_or_url: &str) -> Result<PostDetails, SourceError>;
}
