//! Progress reporting and benchmarking utilities for treediff

use crate::scheduler::RunStats;
#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
#[cfg(feature = "progress")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "progress")]
use std::time::Duration;

/// One-line summary of a run's counters.
pub fn summary(stats: &RunStats) -> String {
    format!(
        "Dirs: {}  Walked: {}  Compared: {}  Hard links: {}  Changes: {}",
        stats.directories(),
        stats.walks(),
        stats.compares(),
        stats.hardlinks_skipped(),
        stats.changes()
    )
}

/// A stderr spinner for an in-flight comparison.
#[cfg(feature = "progress")]
pub fn spinner() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template("[Diffing {elapsed_precise}] {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Refresh the spinner message from `stats` until `done` is set.
#[cfg(feature = "progress")]
pub fn watch(pb: &ProgressBar, stats: &RunStats, done: &AtomicBool) {
    while !done.load(Ordering::Acquire) {
        pb.set_message(summary(stats));
        std::thread::sleep(Duration::from_millis(100));
    }
    pb.set_message(summary(stats));
}

/// Build two synthetic parallel trees with a known set of differences,
/// diff them and report the timing.
#[cfg(feature = "benchmarking")]
pub fn run_synthetic_benchmark(options: crate::DiffOptions) -> crate::Result<()> {
    use crate::{ChangeKind, TreeDiff};
    use std::fs;
    use std::time::Instant;

    let root = std::env::temp_dir().join("treediff-bench");
    let (left, right) = (root.join("left"), root.join("right"));
    let n_dirs = 100;
    let n_files_per_dir = 100;
    let file_size = 4096;
    let _ = fs::remove_dir_all(&root);
    for d in 0..n_dirs {
        let left_dir = left.join(format!("dir{:03}", d));
        let right_dir = right.join(format!("dir{:03}", d));
        fs::create_dir_all(&left_dir)?;
        fs::create_dir_all(&right_dir)?;
        for f in 0..n_files_per_dir {
            let name = format!("file{:03}.bin", f);
            let content = vec![b'x'; file_size];
            fs::write(left_dir.join(&name), &content)?;
            match f {
                // last byte flipped: same size, must be content-compared
                0 => {
                    let mut modified = content;
                    modified[file_size - 1] = b'y';
                    fs::write(right_dir.join(&name), modified)?;
                }
                1 => {
                    fs::remove_file(left_dir.join(&name))?;
                    fs::write(right_dir.join(&name), &content)?;
                }
                2 => {}
                _ => fs::write(right_dir.join(&name), &content)?,
            }
        }
    }
    println!(
        "Synthetic trees created: {} dirs, {} files per side, {} bytes each",
        n_dirs,
        n_dirs * n_files_per_dir,
        file_size
    );

    let differ = TreeDiff::new(options);
    let start = Instant::now();
    let changes = differ.run(&left, &right)?;
    let elapsed = start.elapsed();
    let count = |kind: ChangeKind| changes.iter().filter(|c| c.kind() == kind).count();
    let (modified, added, deleted) = (
        count(ChangeKind::Modify),
        count(ChangeKind::Add),
        count(ChangeKind::Delete),
    );
    println!(
        "Diff complete: modified={}, added={}, deleted={}, time={:?}",
        modified, added, deleted, elapsed
    );
    println!("{}", summary(&differ.stats()));
    if (modified, added, deleted) != (n_dirs, n_dirs, n_dirs) {
        log::warn!(
            "expected {} changes of each kind, got M={} A={} D={}",
            n_dirs,
            modified,
            added,
            deleted
        );
    }
    let _ = fs::remove_dir_all(&root);
    println!("Synthetic benchmark finished and cleaned up.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiffOptions, TreeDiff};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_summary_reflects_run() -> crate::Result<()> {
        let dir = tempdir().unwrap();
        let (left, right) = (dir.path().join("l"), dir.path().join("r"));
        fs::create_dir_all(left.join("sub")).unwrap();
        fs::create_dir_all(right.join("sub")).unwrap();
        fs::write(left.join("sub/a.txt"), b"foo").unwrap();
        fs::write(right.join("sub/a.txt"), b"bar").unwrap();

        let differ = TreeDiff::new(DiffOptions::default());
        let changes = differ.run(&left, &right)?;
        assert_eq!(changes.len(), 1);
        let stats = differ.stats();
        assert_eq!(stats.directories(), 2); // root and sub
        assert_eq!(stats.compares(), 1);
        assert_eq!(
            summary(&stats),
            "Dirs: 2  Walked: 3  Compared: 1  Hard links: 0  Changes: 1"
        );
        Ok(())
    }

    #[cfg(feature = "progress")]
    #[test]
    fn test_watch_returns_when_done() {
        let stats = RunStats::default();
        let done = AtomicBool::new(true);
        let pb = ProgressBar::hidden();
        watch(&pb, &stats, &done);
        assert!(pb.message().starts_with("Dirs: 0"));
    }
}
