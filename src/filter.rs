//! Ignore-list predicate applied to relative paths before they are walked

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

use crate::error::{DiffError, Result};

/// Gitignore-style path filter. An empty filter ignores nothing.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    matcher: Option<Gitignore>,
}

impl IgnoreFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|source| DiffError::Ignore {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        let matcher = builder.build().map_err(|source| DiffError::Ignore {
            pattern: patterns.join(", "),
            source,
        })?;
        Ok(Self {
            matcher: Some(matcher),
        })
    }

    /// Whether `path`, relative to the compared roots, is excluded.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.matched(path, is_dir).is_ignore(),
            None => false,
        }
    }

    /// Whether `path` is excluded both as a file and as a directory, so it
    /// can be dropped without knowing what it is.
    pub fn ignores_any_kind(&self, path: &Path) -> bool {
        self.is_ignored(path, false) && self.is_ignored(path, true)
    }
}
