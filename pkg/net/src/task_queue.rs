use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;

/// spec.md §4.C "Thread Pool", reworked onto `tokio::task::spawn_blocking`
/// (the expanded spec's §4.C supplement): Tokio's blocking pool already
/// gives bounded concurrency, reference counting, and graceful drain, so
/// this wrapper only needs to expose the spec's `run()`/`finish()`/
/// `join()` vocabulary over it.
pub struct TaskQueue {
    finished: AtomicBool,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

impl TaskQueue {
    pub fn new() -> Arc<TaskQueue> {
        Arc::new(TaskQueue { finished: AtomicBool::new(false), tasks: tokio::sync::Mutex::new(JoinSet::new()) })
    }

    /// Enqueues `task`. Rejects (returns `false`) once [`finish`](Self::finish)
    /// has been called — "`finish()` is sticky — after `finish`, `addTask`
    /// rejects; queued tasks still drain" (spec.md §4.C).
    pub async fn run<F>(self: &Arc<Self>, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.finished.load(Ordering::Acquire) {
            return false;
        }
        self.tasks.lock().await.spawn(task);
        true
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    /// Blocks until every spawned task has completed. Matches "`join()`
    /// blocks until all workers have observed `finish` and an empty
    /// queue" in spirit: callers are expected to call `finish()` first so
    /// no further tasks can be added underneath `join`.
    pub async fn join(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

/// Per-client single-flight latch (spec.md §4.C "Ordering"): a client's
/// binary frames are processed in arrival order because its messages
/// share one task that loops on the client's frame queue until empty.
/// `try_acquire` returns `true` exactly once per idle period; the holder
/// must call `release` when its drain loop finds the queue empty.
pub struct SingleFlightLatch {
    running: AtomicBool,
}

impl SingleFlightLatch {
    pub fn new() -> SingleFlightLatch {
        SingleFlightLatch { running: AtomicBool::new(false) }
    }

    /// "if set, no new task is enqueued; if clear, one is" (spec.md
    /// §4.C). Returns `true` if the caller just transitioned the latch
    /// from clear to set and so is responsible for draining.
    pub fn try_acquire(&self) -> bool {
        self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn release(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Default for SingleFlightLatch {
    fn default() -> Self {
        SingleFlightLatch::new()
    }
}
