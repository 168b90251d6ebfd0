//! Recursive comparison of one path across two parallel trees

use log::trace;
use std::fs;
use std::io;
use std::os::unix::fs::DirEntryExt;
use std::path::{Path, PathBuf};

use crate::change::{Change, ChangeKind};
use crate::error::{DiffError, Result};
use crate::filter::IgnoreFilter;
use crate::merge::{DirEntry, merge_entries, sort_entries};
use crate::node::Node;

/// A pending comparison of one relative path.
#[derive(Debug, Clone)]
pub struct WalkTask {
    pub path: PathBuf,
    pub left: Option<Node>,
    pub right: Option<Node>,
}

/// A pending content comparison of two same-sized files.
#[derive(Debug, Clone)]
pub struct CompareTask {
    pub path: PathBuf,
    pub left: PathBuf,
    pub right: PathBuf,
    pub size: u64,
}

/// Where the walker sends what it finds.
///
/// Scheduling must register the task as pending before it becomes visible
/// to any worker.
pub trait WorkSink {
    fn emit(&self, change: Change);
    fn schedule_walk(&self, task: WalkTask);
    fn schedule_compare(&self, task: CompareTask);

    /// Called once per listed directory pair with the number of entries
    /// skipped as the same hard-linked file.
    fn record_listing(&self, _linked: usize) {}
}

/// Compares nodes at the same relative path under two roots.
#[derive(Debug)]
pub struct Walker {
    left_root: PathBuf,
    right_root: PathBuf,
    filter: IgnoreFilter,
}

impl Walker {
    pub fn new(left_root: &Path, right_root: &Path, filter: IgnoreFilter) -> Self {
        Self {
            left_root: left_root.to_path_buf(),
            right_root: right_root.to_path_buf(),
            filter,
        }
    }

    /// Classify one pair of nodes, report leaf mismatches and schedule a
    /// walk for every child that still needs examination.
    pub fn walk<S: WorkSink>(&self, task: WalkTask, sink: &S) -> Result<()> {
        let WalkTask { path, left, right } = task;
        let left_dir = left.as_ref().is_some_and(Node::is_dir);
        let right_dir = right.as_ref().is_some_and(Node::is_dir);

        let left_leaf = left.as_ref().filter(|n| !n.is_dir());
        let right_leaf = right.as_ref().filter(|n| !n.is_dir());
        match (left_leaf, right_leaf) {
            (Some(_), None) => sink.emit(Change::new(ChangeKind::Delete, path.clone())),
            (None, Some(_)) => sink.emit(Change::new(ChangeKind::Add, path.clone())),
            (Some(l), Some(r)) if l.identity_differs(r) => {
                sink.emit(Change::new(ChangeKind::Modify, path.clone()))
            }
            (Some(l), Some(_)) => sink.schedule_compare(CompareTask {
                left: self.left_root.join(&path),
                right: self.right_root.join(&path),
                size: l.size,
                path: path.clone(),
            }),
            (None, None) => {}
        }

        if !left_dir && !right_dir {
            return Ok(());
        }

        let left_entries = if left_dir {
            list_dir(&self.left_root.join(&path))?
        } else {
            Vec::new()
        };
        let right_entries = if right_dir {
            list_dir(&self.right_root.join(&path))?
        } else {
            Vec::new()
        };

        let same_device = matches!((&left, &right), (Some(l), Some(r)) if l.dev == r.dev);
        let merged = merge_entries(&left_entries, &right_entries, same_device);
        sink.record_listing(merged.linked);

        for name in merged.names {
            let child = path.join(&name);
            // Names ignored whatever their type are dropped before any stat.
            if self.filter.ignores_any_kind(&child) {
                trace!("ignoring {}", child.display());
                continue;
            }
            let left = if left_dir {
                Node::lstat(&self.left_root.join(&child))?
            } else {
                None
            };
            let right = if right_dir {
                Node::lstat(&self.right_root.join(&child))?
            } else {
                None
            };
            let is_dir = left.is_some_and(|n| n.is_dir()) || right.is_some_and(|n| n.is_dir());
            if self.filter.is_ignored(&child, is_dir) {
                trace!("ignoring {}", child.display());
                continue;
            }
            sink.schedule_walk(WalkTask {
                path: child,
                left,
                right,
            });
        }
        Ok(())
    }
}

/// List a directory, sorted by name in byte order.
fn list_dir(dir: &Path) -> Result<Vec<DirEntry>> {
    let read_err = |source: io::Error| DiffError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| DirEntry::new(e.file_name(), e.ino())))
        .collect::<io::Result<Vec<_>>>()
        .map_err(read_err)?;
    sort_entries(&mut entries);
    Ok(entries)
}
