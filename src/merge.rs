//! Merge-join of two sorted directory listings

use std::cmp::Ordering;
use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

/// A raw directory entry: name plus the inode reported by the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub ino: u64,
}

impl DirEntry {
    pub fn new(name: impl Into<OsString>, ino: u64) -> Self {
        Self {
            name: name.into(),
            ino,
        }
    }
}

/// Sort entries by name in byte order, the order `merge_entries` expects.
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_unstable_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
}

/// Result of merging two listings.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Merged {
    /// Names that need further examination, in byte order.
    pub names: Vec<OsString>,
    /// Names present on both sides that refer to the same hard-linked inode.
    pub linked: usize,
}

/// Produce the ordered union of two sorted listings.
///
/// A name present on both sides is dropped when both entries carry the same
/// inode and `same_device` says the parent directories live on one device:
/// the two paths are the same file.
pub fn merge_entries(left: &[DirEntry], right: &[DirEntry], same_device: bool) -> Merged {
    let mut merged = Merged {
        names: Vec::with_capacity(left.len().max(right.len())),
        linked: 0,
    };
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        let (l, r) = (&left[i], &right[j]);
        match l.name.as_bytes().cmp(r.name.as_bytes()) {
            Ordering::Less => {
                merged.names.push(l.name.clone());
                i += 1;
            }
            Ordering::Greater => {
                merged.names.push(r.name.clone());
                j += 1;
            }
            Ordering::Equal => {
                if same_device && l.ino == r.ino {
                    merged.linked += 1;
                } else {
                    merged.names.push(l.name.clone());
                }
                i += 1;
                j += 1;
            }
        }
    }
    merged.names.extend(left[i..].iter().map(|e| e.name.clone()));
    merged.names.extend(right[j..].iter().map(|e| e.name.clone()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(items: &[(&str, u64)]) -> Vec<DirEntry> {
        items.iter().map(|(n, i)| DirEntry::new(*n, *i)).collect()
    }

    fn names(merged: &Merged) -> Vec<&str> {
        merged.names.iter().map(|n| n.to_str().unwrap()).collect()
    }

    #[test]
    fn test_interleaved_union() {
        let left = entries(&[("a", 1), ("c", 2), ("e", 3)]);
        let right = entries(&[("b", 10), ("c", 11), ("f", 12), ("g", 13)]);
        let merged = merge_entries(&left, &right, true);
        assert_eq!(names(&merged), ["a", "b", "c", "e", "f", "g"]);
        assert_eq!(merged.linked, 0);
    }

    #[test]
    fn test_hard_link_identity_is_skipped() {
        let left = entries(&[("a", 7), ("b", 8)]);
        let right = entries(&[("a", 7), ("b", 9)]);
        let merged = merge_entries(&left, &right, true);
        assert_eq!(names(&merged), ["b"]);
        assert_eq!(merged.linked, 1);
    }

    #[test]
    fn test_same_inode_on_other_device_is_kept() {
        let left = entries(&[("a", 7)]);
        let right = entries(&[("a", 7)]);
        let merged = merge_entries(&left, &right, false);
        assert_eq!(names(&merged), ["a"]);
        assert_eq!(merged.linked, 0);
    }

    #[test]
    fn test_one_side_empty() {
        let left = entries(&[("x", 1), ("y", 2)]);
        assert_eq!(names(&merge_entries(&left, &[], true)), ["x", "y"]);
        assert_eq!(names(&merge_entries(&[], &left, true)), ["x", "y"]);
        assert_eq!(merge_entries(&[], &[], true), Merged::default());
    }

    #[test]
    fn test_sort_is_bytewise_and_merge_is_stable() {
        let mut left = entries(&[("b", 1), ("B", 2), ("a", 3), ("_", 4)]);
        sort_entries(&mut left);
        let mut right = entries(&[("a", 30), ("Z", 31)]);
        sort_entries(&mut right);
        let first = merge_entries(&left, &right, true);
        assert_eq!(names(&first), ["B", "Z", "_", "a", "b"]);
        assert_eq!(first, merge_entries(&left, &right, true));
    }
}
