//! Post Archiver Library
//!
//! Incrementally archives Reddit posts: discovered posts are tracked in a JSON
//! link store, and every post still marked `new` is fetched with its comment
//! tree, its media downloaded concurrently, and the result rendered as a
//! Markdown document.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`store`] - JSON link store with `new`/`downloaded` statuses
//! - [`media`] - Media reference extraction and fetch-URL/filename resolution
//! - [`download`] - Bounded concurrent media downloader with per-run dedup
//! - [`comments`] - Comment-tree flattening
//! - [`render`] - Markdown document rendering
//! - [`source`] - Content source trait and the Reddit JSON client
//! - [`pipeline`] - Discovery and the download batch
//! - [`config`] - Layered runtime settings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod comments;
pub mod config;
pub mod download;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod store;
pub mod user_agent;

// Re-export commonly used types
pub use comments::{CommentEntry, CommentNode, collect_media, walk};
pub use config::{ConfigError, ConfigLayer, Settings};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadContext, DownloadError, DownloadResults, EngineError, HttpClient,
    MediaDownloader,
};
pub use media::{MediaRef, extract};
pub use pipeline::{BatchReport, DiscoverReport, Pipeline, PipelineError, discover};
pub use render::render_document;
pub use source::{ContentSource, PostDetails, PostSummary, RedditClient, SortMode, SourceError};
pub use store::{LinkRecord, LinkStatus, LinkStore, StoreError, StoreSummary, merge};
