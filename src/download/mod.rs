//! Concurrent media downloads for a single post.
//!
//! This module fetches media references into a post's `media_files`
//! directory with a bounded worker pool.
//!
//! # Features
//!
//! - Streaming downloads through a fixed-size write buffer
//! - Connect and per-read timeouts (no overall batch timeout)
//! - Per-run URL dedup shared across posts via [`DownloadContext`]
//! - Failures recorded as absent results, never aborting the batch

mod client;
mod constants;
mod engine;
mod error;

pub use client::HttpClient;
pub use constants::{CHUNK_SIZE, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use engine::{DownloadContext, DownloadResults, EngineError, MediaDownloader};
pub use error::DownloadError;
