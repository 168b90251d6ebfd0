//! Error types for treediff

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a tree comparison.
///
/// Per-pair content comparison failures are not represented here: they are
/// logged and the pair is reported as modified instead.
#[derive(Error, Debug)]
pub enum DiffError {
    /// A node could not be stat-ed for a reason other than not existing
    #[error("failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory encountered during traversal could not be listed
    #[error("failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A root does not resolve to a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// An ignore pattern could not be compiled
    #[error("invalid ignore pattern '{pattern}': {source}")]
    Ignore {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    /// The worker pool could not be started
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Other I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, DiffError>;
