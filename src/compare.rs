//! Byte-level content comparison for treediff

use log::{trace, warn};
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Chunk size for the buffered fallback.
const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of comparing two same-sized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Identical,
    Different,
    /// The pair could not be compared; callers treat this as different.
    Failed,
}

impl Comparison {
    pub fn is_identical(self) -> bool {
        self == Comparison::Identical
    }
}

/// Compare two nodes of equal size for content identity.
///
/// Zero-length pairs are identical without touching the filesystem. Both
/// paths are `lstat`-ed up front: two symlinks compare by target, a symlink
/// against anything else is different, and two regular files compare byte
/// for byte through read-only memory maps.
pub fn compare_contents(left: &Path, right: &Path, size: u64) -> Comparison {
    if size == 0 {
        return Comparison::Identical;
    }
    let left_meta = match fs::symlink_metadata(left) {
        Ok(meta) => meta,
        Err(err) => {
            warn!("lstat failed for {}: {err}", left.display());
            return Comparison::Failed;
        }
    };
    let right_meta = match fs::symlink_metadata(right) {
        Ok(meta) => meta,
        Err(err) => {
            warn!("lstat failed for {}: {err}", right.display());
            return Comparison::Failed;
        }
    };

    let (left_type, right_type) = (left_meta.file_type(), right_meta.file_type());
    match (left_type.is_symlink(), right_type.is_symlink()) {
        (true, true) => compare_link_targets(left, right),
        (true, false) | (false, true) => Comparison::Different,
        (false, false) if left_type.is_file() && right_type.is_file() => {
            compare_files(left, right)
        }
        (false, false) => {
            warn!(
                "cannot compare contents of non-regular files {} and {}",
                left.display(),
                right.display()
            );
            Comparison::Failed
        }
    }
}

/// Compare the target strings of two symlinks without resolving them.
pub fn compare_link_targets(left: &Path, right: &Path) -> Comparison {
    let left_target = match fs::read_link(left) {
        Ok(target) => target,
        Err(err) => {
            warn!("couldn't readlink on {}: {err}", left.display());
            return Comparison::Failed;
        }
    };
    let right_target = match fs::read_link(right) {
        Ok(target) => target,
        Err(err) => {
            warn!("couldn't readlink on {}: {err}", right.display());
            return Comparison::Failed;
        }
    };
    if left_target == right_target {
        Comparison::Identical
    } else {
        Comparison::Different
    }
}

/// Compare two regular files through memory maps, falling back to buffered
/// reads when either file cannot be mapped.
fn compare_files(left: &Path, right: &Path) -> Comparison {
    let left_file = match File::open(left) {
        Ok(file) => file,
        Err(err) => {
            warn!("error opening file {}: {err}", left.display());
            return Comparison::Failed;
        }
    };
    let right_file = match File::open(right) {
        Ok(file) => file,
        Err(err) => {
            warn!("error opening file {}: {err}", right.display());
            return Comparison::Failed;
        }
    };

    // SAFETY: both maps are private to this call and dropped before it
    // returns. Concurrent modification of the trees only makes the result
    // unreliable, which is an accepted limitation of comparing live trees.
    let maps = unsafe { (Mmap::map(&left_file), Mmap::map(&right_file)) };
    match maps {
        (Ok(left_map), Ok(right_map)) => {
            if left_map[..] == right_map[..] {
                Comparison::Identical
            } else {
                Comparison::Different
            }
        }
        (Err(err), _) | (_, Err(err)) => {
            trace!(
                "mmap unavailable for {} or {} ({err}), using buffered reads",
                left.display(),
                right.display()
            );
            compare_buffered(left, right, left_file, right_file)
        }
    }
}

/// Buffered comparison of two already opened files.
fn compare_buffered(left: &Path, right: &Path, left_file: File, right_file: File) -> Comparison {
    match compare_readers(left_file, right_file) {
        Ok(true) => Comparison::Identical,
        Ok(false) => Comparison::Different,
        Err(err) => {
            warn!(
                "error reading {} and {}: {err}",
                left.display(),
                right.display()
            );
            Comparison::Failed
        }
    }
}

/// Compare two byte streams chunk by chunk.
pub fn compare_readers(left: impl Read, right: impl Read) -> io::Result<bool> {
    let mut left = BufReader::with_capacity(CHUNK_SIZE, left);
    let mut right = BufReader::with_capacity(CHUNK_SIZE, right);
    let mut left_buf = vec![0u8; CHUNK_SIZE];
    let mut right_buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = fill(&mut left, &mut left_buf)?;
        let m = fill(&mut right, &mut right_buf)?;
        if left_buf[..n] != right_buf[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the stream ends.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
