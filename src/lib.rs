//! Core library for treediff: concurrent name-status diffing of two parallel directory trees.
//!
//! Every path that differs between the two trees is reported once as added,
//! deleted or modified, much like `git diff --name-status --no-renames`.
//! Timestamp-only changes are never reported; a file counts as modified when
//! its type, size, ownership, permissions or device number differ, or when its
//! bytes do.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let changes = treediff::changes(Path::new("before"), Path::new("after"), &[])?;
//! for change in &changes {
//!     println!("{change}");
//! }
//! # Ok::<(), treediff::DiffError>(())
//! ```

#[cfg(not(unix))]
compile_error!("treediff relies on unix device and inode metadata");

use std::path::Path;

pub mod change;
pub mod compare;
pub mod error;
pub mod filter;
pub mod merge;
pub mod node;
pub mod progress;
pub mod scheduler;
pub mod walker;

pub use change::{Change, ChangeKind};
pub use error::{DiffError, Result};
pub use scheduler::{DiffOptions, RunStats, TreeDiff};

/// Compare two parallel directory trees with the default worker pools.
///
/// `ignore` holds gitignore-style patterns; matching paths and everything
/// below them are left out of the comparison.
pub fn changes(root1: &Path, root2: &Path, ignore: &[String]) -> Result<Vec<Change>> {
    TreeDiff::new(DiffOptions::default().ignore(ignore.iter().cloned())).run(root1, root2)
}
