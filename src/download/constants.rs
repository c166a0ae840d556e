//! Constants for the download module (timeouts, buffering, pool bounds).

/// Default HTTP connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-read timeout in seconds; there is no overall batch timeout.
pub const READ_TIMEOUT_SECS: u64 = 10;

/// Size of the buffered writer used when streaming bodies to disk.
pub const CHUNK_SIZE: usize = 8192;

/// Minimum allowed worker pool size.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed worker pool size.
pub const MAX_CONCURRENCY: usize = 100;

/// Default worker pool size.
pub const DEFAULT_CONCURRENCY: usize = 5;
