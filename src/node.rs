//! Per-side node descriptors derived from `lstat`

use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{DiffError, Result};

/// The file type of a node, as seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

/// Identity-relevant metadata for one side of a path.
///
/// Timestamps are deliberately absent: a node whose only difference is its
/// mtime or ctime is not a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub dev: u64,
    pub ino: u64,
}

impl Node {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let file_type = meta.file_type();
        let kind = if file_type.is_dir() {
            NodeKind::Directory
        } else if file_type.is_symlink() {
            NodeKind::Symlink
        } else if file_type.is_file() {
            NodeKind::Regular
        } else {
            NodeKind::Other
        };
        Self {
            kind,
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev(),
            size: meta.size(),
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    /// `lstat` a path, mapping "not found" to `None`.
    ///
    /// Any other failure is fatal for the run.
    pub fn lstat(path: &Path) -> Result<Option<Self>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DiffError::Stat {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Stat a comparison root, following symlinks as a trailing separator
    /// would. A root must exist and be a directory.
    pub fn root(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|source| DiffError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(DiffError::NotADirectory(path.to_path_buf()));
        }
        Ok(Self::from_metadata(&meta))
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// True when metadata alone proves the two nodes differ.
    ///
    /// The mode includes the file type bits, so a symlink never matches a
    /// regular file here.
    pub fn identity_differs(&self, other: &Node) -> bool {
        self.mode != other.mode
            || self.uid != other.uid
            || self.gid != other.gid
            || self.rdev != other.rdev
            || self.size != other.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, Permissions};
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_lstat_missing_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(Node::lstat(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn test_lstat_classifies_kinds() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"abc").unwrap();
        std::os::unix::fs::symlink("f", dir.path().join("l")).unwrap();

        let node = Node::lstat(&file).unwrap().unwrap();
        assert_eq!(node.kind, NodeKind::Regular);
        assert_eq!(node.size, 3);
        let link = Node::lstat(&dir.path().join("l")).unwrap().unwrap();
        assert_eq!(link.kind, NodeKind::Symlink);
        assert!(Node::lstat(dir.path()).unwrap().unwrap().is_dir());
    }

    #[test]
    fn test_mtime_is_not_identity() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"same").unwrap();
        fs::write(&b, b"same").unwrap();
        File::options()
            .write(true)
            .open(&b)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))
            .unwrap();

        let na = Node::lstat(&a).unwrap().unwrap();
        let nb = Node::lstat(&b).unwrap().unwrap();
        assert!(!na.identity_differs(&nb));
    }

    #[test]
    fn test_size_and_mode_are_identity() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        fs::write(&a, b"same").unwrap();
        fs::write(&b, b"longer").unwrap();
        fs::write(&c, b"same").unwrap();
        fs::set_permissions(&a, Permissions::from_mode(0o644)).unwrap();
        fs::set_permissions(&c, Permissions::from_mode(0o600)).unwrap();

        let na = Node::lstat(&a).unwrap().unwrap();
        assert!(na.identity_differs(&Node::lstat(&b).unwrap().unwrap()));
        assert!(na.identity_differs(&Node::lstat(&c).unwrap().unwrap()));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(Node::root(&file), Err(DiffError::NotADirectory(_))));
        assert!(matches!(
            Node::root(&dir.path().join("missing")),
            Err(DiffError::Stat { .. })
        ));
        assert!(Node::root(dir.path()).unwrap().is_dir());
    }
}
