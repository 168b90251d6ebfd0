//! Worker pools and completion tracking for a single tree comparison

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use log::{debug, error, trace};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use crate::change::{Change, ChangeKind};
use crate::compare::compare_contents;
use crate::error::{DiffError, Result};
use crate::filter::IgnoreFilter;
use crate::node::Node;
use crate::walker::{CompareTask, WalkTask, Walker, WorkSink};

/// Default size of each worker pool.
pub const DEFAULT_WORKERS: usize = 8;

/// Default capacity of the compare-task queue.
pub const DEFAULT_COMPARE_QUEUE_DEPTH: usize = 32;

/// Tunables for a comparison run.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    walk_workers: usize,
    compare_workers: usize,
    compare_queue_depth: usize,
    ignore: Vec<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            walk_workers: DEFAULT_WORKERS,
            compare_workers: DEFAULT_WORKERS,
            compare_queue_depth: DEFAULT_COMPARE_QUEUE_DEPTH,
            ignore: Vec::new(),
        }
    }
}

impl DiffOptions {
    pub fn walk_workers(mut self, n: usize) -> Self {
        self.walk_workers = n.max(1);
        self
    }

    pub fn compare_workers(mut self, n: usize) -> Self {
        self.compare_workers = n.max(1);
        self
    }

    pub fn compare_queue_depth(mut self, n: usize) -> Self {
        self.compare_queue_depth = n.max(1);
        self
    }

    /// Gitignore-style patterns matched against relative paths.
    pub fn ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }
}

/// Counters for a run, readable while it is in flight.
#[derive(Debug, Default)]
pub struct RunStats {
    directories: AtomicU64,
    walks: AtomicU64,
    compares: AtomicU64,
    hardlinks_skipped: AtomicU64,
    changes: AtomicU64,
}

impl RunStats {
    /// Directory pairs listed.
    pub fn directories(&self) -> u64 {
        self.directories.load(Ordering::Relaxed)
    }

    /// Walk tasks processed, including the roots.
    pub fn walks(&self) -> u64 {
        self.walks.load(Ordering::Relaxed)
    }

    /// Content comparisons performed.
    pub fn compares(&self) -> u64 {
        self.compares.load(Ordering::Relaxed)
    }

    /// Entries skipped as the same hard-linked file on both sides.
    pub fn hardlinks_skipped(&self) -> u64 {
        self.hardlinks_skipped.load(Ordering::Relaxed)
    }

    /// Changes emitted so far.
    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        for counter in [
            &self.directories,
            &self.walks,
            &self.compares,
            &self.hardlinks_skipped,
            &self.changes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Count of outstanding tasks with a wait-until-zero primitive.
#[derive(Debug, Default)]
struct PendingWork {
    count: Mutex<usize>,
    zero: Condvar,
}

impl PendingWork {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    fn wait(&self) {
        let count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let _count = self
            .zero
            .wait_while(count, |count| *count != 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Marks one task complete when dropped, on every exit path.
struct Completion<'a>(&'a PendingWork);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

/// Shared state for one run. Nothing here outlives `TreeDiff::run`.
struct Run<'a> {
    walks: Sender<WalkTask>,
    compares: Sender<CompareTask>,
    changes: Sender<Change>,
    pending: PendingWork,
    error: OnceLock<DiffError>,
    stats: &'a RunStats,
}

impl Run<'_> {
    /// Record a fatal error. The first one wins.
    fn fail(&self, err: DiffError) {
        error!("{err}");
        if let Err(later) = self.error.set(err) {
            debug!("suppressing subsequent error: {later}");
        }
    }

    fn process_walk(&self, walker: &Walker, task: WalkTask) {
        let _done = Completion(&self.pending);
        if self.error.get().is_some() {
            trace!("skipping {} after fatal error", task.path.display());
            return;
        }
        self.stats.walks.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = walker.walk(task, self) {
            self.fail(err);
        }
    }

    fn process_compare(&self, task: CompareTask) {
        let _done = Completion(&self.pending);
        self.stats.compares.fetch_add(1, Ordering::Relaxed);
        let result = compare_contents(&task.left, &task.right, task.size);
        trace!("{}: {result:?}", task.path.display());
        if !result.is_identical() {
            self.emit(Change::new(ChangeKind::Modify, task.path));
        }
    }
}

impl WorkSink for Run<'_> {
    fn emit(&self, change: Change) {
        self.stats.changes.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.changes.send(change) {
            error!("change collector is gone, dropping {}", err.into_inner());
        }
    }

    fn schedule_walk(&self, task: WalkTask) {
        self.pending.add();
        if let Err(err) = self.walks.send(task) {
            self.pending.done();
            error!("walk queue closed, dropping {}", err.into_inner().path.display());
        }
    }

    fn schedule_compare(&self, task: CompareTask) {
        self.pending.add();
        if let Err(err) = self.compares.send(task) {
            self.pending.done();
            error!("compare queue closed, dropping {}", err.into_inner().path.display());
        }
    }

    fn record_listing(&self, linked: usize) {
        self.stats.directories.fetch_add(1, Ordering::Relaxed);
        self.stats
            .hardlinks_skipped
            .fetch_add(linked as u64, Ordering::Relaxed);
    }
}

fn walk_worker(run: &Run<'_>, walker: &Walker, tasks: &Receiver<WalkTask>, stop: &Receiver<()>) {
    loop {
        select! {
            recv(tasks) -> task => match task {
                Ok(task) => run.process_walk(walker, task),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}

fn compare_worker(run: &Run<'_>, tasks: &Receiver<CompareTask>, stop: &Receiver<()>) {
    loop {
        select! {
            recv(tasks) -> task => match task {
                Ok(task) => run.process_compare(task),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}

/// Drain changes until the run stops, then pick up whatever is still queued.
fn collect(changes: &Receiver<Change>, stop: &Receiver<()>) -> Vec<Change> {
    let mut collected = Vec::new();
    loop {
        select! {
            recv(changes) -> change => match change {
                Ok(change) => collected.push(change),
                Err(_) => break,
            },
            recv(stop) -> _ => {
                collected.extend(changes.try_iter());
                break;
            }
        }
    }
    collected
}

/// Concurrent name-status comparison of two parallel directory trees.
#[derive(Debug, Default)]
pub struct TreeDiff {
    options: DiffOptions,
    stats: Arc<RunStats>,
}

impl TreeDiff {
    pub fn new(options: DiffOptions) -> Self {
        Self {
            options,
            stats: Arc::default(),
        }
    }

    /// Counters of the current or most recent run.
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    /// Compare `left` against `right` and return every change, in no
    /// particular order.
    ///
    /// Both roots are treated as directories. A fatal error (an unreadable
    /// root or directory) is returned once all scheduled work has drained.
    pub fn run(&self, left: &Path, right: &Path) -> Result<Vec<Change>> {
        let started = Instant::now();
        self.stats.reset();
        let filter = IgnoreFilter::new(&self.options.ignore)?;
        let root = WalkTask {
            path: PathBuf::new(),
            left: Some(Node::root(left)?),
            right: Some(Node::root(right)?),
        };
        let walker = Walker::new(left, right, filter);

        let (walk_tx, walk_rx) = unbounded();
        let (compare_tx, compare_rx) = bounded(self.options.compare_queue_depth);
        let (change_tx, change_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let run = Run {
            walks: walk_tx,
            compares: compare_tx,
            changes: change_tx,
            pending: PendingWork::default(),
            error: OnceLock::new(),
            stats: &self.stats,
        };

        // One thread per long-lived worker loop plus the collector.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.walk_workers + self.options.compare_workers + 1)
            .thread_name(|i| format!("treediff-{i}"))
            .build()?;

        let mut changes = Vec::new();
        let collected = &mut changes;
        let (ctx, walker) = (&run, &walker);
        let (walk_rx, compare_rx, change_rx, stop_rx) = (&walk_rx, &compare_rx, &change_rx, &stop_rx);
        pool.in_place_scope(move |s| {
            s.spawn(move |_| *collected = collect(change_rx, stop_rx));
            for _ in 0..self.options.walk_workers {
                s.spawn(move |_| walk_worker(ctx, walker, walk_rx, stop_rx));
            }
            for _ in 0..self.options.compare_workers {
                s.spawn(move |_| compare_worker(ctx, compare_rx, stop_rx));
            }

            // The roots are walked on the calling thread; their children
            // fan out to the pools.
            ctx.pending.add();
            ctx.process_walk(walker, root);
            ctx.pending.wait();
            drop(stop_tx);
        });

        debug!(
            "compared {} and {} in {:.2?}: {} directories, {} walks, {} content comparisons, {} hard links skipped, {} changes",
            left.display(),
            right.display(),
            started.elapsed(),
            self.stats.directories(),
            self.stats.walks(),
            self.stats.compares(),
            self.stats.hardlinks_skipped(),
            changes.len(),
        );

        match run.error.into_inner() {
            Some(err) => Err(err),
            None => Ok(changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_options_clamp_to_one() {
        let opts = DiffOptions::default()
            .walk_workers(0)
            .compare_workers(0)
            .compare_queue_depth(0)
            .ignore(["*.o"]);
        assert_eq!(opts.walk_workers, 1);
        assert_eq!(opts.compare_workers, 1);
        assert_eq!(opts.compare_queue_depth, 1);
        assert_eq!(opts.ignore, ["*.o"]);
    }

    #[test]
    fn test_pending_work_waits_for_zero() {
        let pending = PendingWork::default();
        pending.add();
        pending.add();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                let _first = Completion(&pending);
                pending.add();
                drop(Completion(&pending));
                thread::sleep(Duration::from_millis(20));
                pending.done();
            });
            pending.wait();
        });
        assert_eq!(*pending.count.lock().unwrap(), 0);
    }

    #[test]
    fn test_failed_comparison_is_reported_as_modify() {
        let dir = tempfile::tempdir().unwrap();
        let (walks, _walk_rx) = unbounded();
        let (compares, _compare_rx) = unbounded();
        let (changes, change_rx) = unbounded();
        let stats = RunStats::default();
        let run = Run {
            walks,
            compares,
            changes,
            pending: PendingWork::default(),
            error: OnceLock::new(),
            stats: &stats,
        };

        // Neither side can be opened, so the pair cannot be compared.
        run.pending.add();
        run.process_compare(CompareTask {
            path: PathBuf::from("vanished"),
            left: dir.path().join("a"),
            right: dir.path().join("b"),
            size: 4,
        });
        run.pending.wait();

        let reported: Vec<Change> = change_rx.try_iter().collect();
        assert_eq!(reported, [Change::new(ChangeKind::Modify, "vanished")]);
        assert_eq!(stats.compares(), 1);
        assert_eq!(stats.changes(), 1);
    }

    #[test]
    fn test_pending_work_zero_returns_immediately() {
        PendingWork::default().wait();
    }
}
