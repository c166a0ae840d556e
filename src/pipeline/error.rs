//! Error types for the archive pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

/// Errors raised while discovering or archiving posts.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The content source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The link store could not be saved.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Writing archive output failed.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Creates an IO error for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the run must stop rather than move to the next post.
    ///
    /// Source authentication and configuration failures are fatal, as is a
    /// store that cannot be saved. Anything scoped to a single post is not.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Source(e) => e.is_fatal(),
            Self::Store(_) => true,
            Self::Io { .. } => false,
        }
    }
}
