//! Error types for content sources.

use thiserror::Error;

/// Errors that can occur while listing or fetching posts.
///
/// [`SourceError::Auth`] and [`SourceError::Config`] are fatal: retrying the
/// next post cannot succeed, so callers stop the batch. Everything else is
/// scoped to the single request that produced it.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials were rejected or a token could not be obtained.
    #[error("authentication failed: {message}")]
    Auth {
        /// Details about the failure.
        message: String,
    },

    /// The source is misconfigured (bad base URL, unusable user agent).
    #[error("invalid source configuration: {message}")]
    Config {
        /// Details about the failure.
        message: String,
    },

    /// Network or transport error.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Malformed {
        /// The URL that was requested.
        url: String,
        /// What was wrong with it.
        message: String,
    },
}

impl SourceError {
    /// Creates an authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Maps a non-success status, treating 401 and 403 as authentication failures.
    #[must_use]
    pub fn from_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        match status {
            401 | 403 => Self::auth(format!("HTTP {status} requesting {url}")),
            _ => Self::HttpStatus { url, status },
        }
    }

    /// Creates a malformed-response error.
    #[must_use]
    pub fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true when the error cannot be fixed by moving to the next post.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Config { .. })
    }
}
