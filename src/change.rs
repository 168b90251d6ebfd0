//! Change records reported by a tree comparison

use std::fmt;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// How a path differs between the first tree and the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    Modify,
    Add,
    Delete,
}

impl ChangeKind {
    /// The single-letter code used in name-status output.
    pub fn letter(self) -> char {
        match self {
            ChangeKind::Modify => 'M',
            ChangeKind::Add => 'A',
            ChangeKind::Delete => 'D',
        }
    }
}

/// A single divergence between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Change {
    kind: ChangeKind,
    path: PathBuf,
}

impl Change {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Path relative to the compared roots.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the `<kind-letter>\t<relative-path>\n` output line with the
    /// path's raw bytes, so names that are not UTF-8 stay distinct.
    pub fn write_name_status(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}\t", self.kind.letter())?;
        out.write_all(self.path.as_os_str().as_bytes())?;
        out.write_all(b"\n")
    }
}

/// Lossy `<kind-letter>\t<relative-path>` form, for logs.
impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.kind.letter(), self.path.display())
    }
}
