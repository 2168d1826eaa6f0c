use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use crate::endpoints::Endpoints;
use crate::error::{EngineError, StoreError};
use crate::shard::ShardHandle;

/// spec.md §3 "DatabasePool": `hash -> queue<ShardHandle>` plus a `count`
/// per queue. The invariant `|free| + |outstanding| == count`, `count <= 1`
/// for writable queues and `count <= cap` for read-only ones (spec.md §8),
/// is maintained entirely by [`DatabasePool::checkout`]/[`checkin`].
struct Queue {
    free: VecDeque<ShardHandle>,
    count: u32,
}

impl Queue {
    fn new() -> Queue {
        Queue { free: VecDeque::new(), count: 0 }
    }
}

pub struct DatabasePool {
    queues: Mutex<HashMap<u64, Queue>>,
    notify: Notify,
    checkout_timeout: Duration,
    read_only_cap: u32,
    data_dir: Option<std::path::PathBuf>,
}

/// Held until [`DatabasePool::checkin`] is called; dropping it without
/// checking in would leak the outstanding count, so callers should route
/// through `checkin` explicitly (no `Drop` auto-return: spec.md's
/// checkin is an explicit operation, and automatic return on drop would
/// hide reopen/repair decisions the caller needs to make first).
pub struct Checkout {
    pub handle: ShardHandle,
}

impl DatabasePool {
    pub fn new(checkout_timeout: Duration, read_only_cap: u32) -> DatabasePool {
        DatabasePool { queues: Mutex::new(HashMap::new()), notify: Notify::new(), checkout_timeout, read_only_cap, data_dir: None }
    }

    pub fn with_data_dir(mut self, dir: std::path::PathBuf) -> DatabasePool {
        self.data_dir = Some(dir);
        self
    }

    /// spec.md §4.D "Checkout contract".
    pub async fn checkout(&self, endpoints: Endpoints, writable: bool) -> Result<Checkout, StoreError> {
        if endpoints.is_empty() {
            return Err(StoreError::EmptyEndpoints);
        }
        let hash = endpoints.hash(writable);
        let cap = if writable { 1 } else { self.read_only_cap };

        loop {
            {
                let mut queues = self.queues.lock().await;
                let queue = queues.entry(hash).or_insert_with(Queue::new);
                if let Some(handle) = queue.free.pop_front() {
                    return Ok(Checkout { handle });
                }
                if queue.count < cap {
                    queue.count += 1;
                    drop(queues);
                    return self.open_new(endpoints, writable, hash).await;
                }
            }

            match timeout(self.checkout_timeout, self.notify.notified()).await {
                Ok(()) => continue,
                Err(_) => return Err(StoreError::Busy),
            }
        }
    }

    async fn open_new(&self, endpoints: Endpoints, writable: bool, hash: u64) -> Result<Checkout, StoreError> {
        let dir = self.data_dir.clone().unwrap_or_default();
        let opened = if dir.as_os_str().is_empty() {
            Ok(ShardHandle::in_memory(endpoints, writable, hash))
        } else {
            let shard_dir = dir.join(hash.to_string());
            ShardHandle::open(endpoints, writable, hash, shard_dir)
        };

        match opened {
            Ok(handle) => Ok(Checkout { handle }),
            Err(err) => {
                // Open failed: "propagates an error and does not increment
                // count" (spec.md §4.D).
                let mut queues = self.queues.lock().await;
                if let Some(queue) = queues.get_mut(&hash) {
                    queue.count -= 1;
                }
                drop(queues);
                self.notify.notify_one();
                Err(err)
            }
        }
    }

    /// spec.md §4.D "Checkin contract": pushes the handle back without
    /// closing it; wakes exactly one waiter blocked in `checkout`.
    pub async fn checkin(&self, checkout: Checkout) {
        let hash = checkout.handle.hash;
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(hash).or_insert_with(Queue::new);
        queue.free.push_back(checkout.handle);
        drop(queues);
        self.notify.notify_one();
    }

    /// Discards a handle that can't be returned to the pool as-is (a
    /// retriable error left it in an unknown state): decrements `count`
    /// without pushing it onto the free list, so the next checkout opens
    /// a fresh handle instead of waiting on a slot nothing will ever
    /// free.
    async fn discard(&self, hash: u64) {
        let mut queues = self.queues.lock().await;
        if let Some(queue) = queues.get_mut(&hash) {
            queue.count = queue.count.saturating_sub(1);
        }
        drop(queues);
        self.notify.notify_one();
    }

    /// Drains every queued handle without touching `count` bookkeeping —
    /// called on pool teardown (spec.md §4.D "On pool teardown, all
    /// queued handles are destroyed").
    pub async fn drain(&self) {
        let mut queues = self.queues.lock().await;
        for queue in queues.values_mut() {
            queue.free.clear();
        }
    }

    #[cfg(test)]
    async fn outstanding(&self, hash: u64) -> u32 {
        let queues = self.queues.lock().await;
        queues.get(&hash).map(|q| q.count - q.free.len() as u32).unwrap_or(0)
    }
}

/// Bounded retry-with-reopen combinator (spec.md §4.D "Reopen/repair"):
/// runs `op` against the checked-out handle; on a retriable
/// [`EngineError`] (stale snapshot, transient network, database closed)
/// the handle is dropped and a fresh one checked out before retrying, up
/// to `attempts` times. After the final attempt the original error is
/// re-raised.
pub async fn retry_with_reopen<T, F, Fut>(
    pool: &DatabasePool,
    endpoints: Endpoints,
    writable: bool,
    attempts: u32,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut(&mut ShardHandle) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut last_err = None;
    for _ in 0..attempts.max(1) {
        let mut checkout = pool.checkout(endpoints.clone(), writable).await?;
        match op(&mut checkout.handle).await {
            Ok(value) => {
                pool.checkin(checkout).await;
                return Ok(value);
            }
            Err(err) if is_retriable(&err) => {
                last_err = Some(err);
                // The handle is in an unknown state after a retriable
                // error; don't hand it back to the pool as-is.
                let hash = checkout.handle.hash;
                drop(checkout);
                pool.discard(hash).await;
                continue;
            }
            Err(err) => {
                pool.checkin(checkout).await;
                return Err(err);
            }
        }
    }
    Err(last_err.unwrap_or(StoreError::Engine(EngineError::DatabaseClosed)))
}

fn is_retriable(err: &StoreError) -> bool {
    use core::error::Classify;
    err.kind().is_retriable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver::{Endpoint, Protocol};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn endpoints(path: &str) -> Endpoints {
        Endpoints::new([Endpoint { protocol: Protocol::File, host: String::new(), port: 0, path: path.into(), mastery_level: 0 }])
    }

    #[tokio::test]
    async fn writable_checkout_is_exclusive() {
        let pool = Arc::new(DatabasePool::new(Duration::from_millis(50), 4));
        let a = pool.checkout(endpoints("idx"), true).await.unwrap();
        assert_eq!(pool.outstanding(endpoints("idx").hash(true)).await, 1);

        let result = pool.checkout(endpoints("idx"), true).await;
        assert!(matches!(result, Err(StoreError::Busy)));

        pool.checkin(a).await;
        let b = pool.checkout(endpoints("idx"), true).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn checked_in_handle_is_reused_not_reopened() {
        let pool = DatabasePool::new(Duration::from_millis(50), 4);
        let a = pool.checkout(endpoints("idx"), true).await.unwrap();
        let uuid = a.handle.engine().uuid();
        pool.checkin(a).await;

        let b = pool.checkout(endpoints("idx"), true).await.unwrap();
        assert_eq!(b.handle.engine().uuid(), uuid);
    }

    #[tokio::test]
    async fn empty_endpoints_is_a_client_error() {
        let pool = DatabasePool::new(Duration::from_millis(50), 4);
        let result = pool.checkout(Endpoints::new([]), true).await;
        assert!(matches!(result, Err(StoreError::EmptyEndpoints)));
    }

    #[tokio::test]
    async fn read_only_checkouts_share_up_to_the_cap() {
        let pool = DatabasePool::new(Duration::from_millis(50), 2);
        let a = pool.checkout(endpoints("idx"), false).await.unwrap();
        let b = pool.checkout(endpoints("idx"), false).await.unwrap();
        let result = pool.checkout(endpoints("idx"), false).await;
        assert!(matches!(result, Err(StoreError::Busy)));
        pool.checkin(a).await;
        pool.checkin(b).await;
    }

    #[tokio::test]
    async fn retry_with_reopen_retries_on_stale_snapshot_then_succeeds() {
        let pool = DatabasePool::new(Duration::from_millis(50), 4);
        let calls = AtomicU32::new(0);
        let result = retry_with_reopen(&pool, endpoints("idx"), true, 3, |_handle| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(StoreError::Engine(EngineError::StaleSnapshot))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_with_reopen_gives_up_after_the_bound() {
        let pool = DatabasePool::new(Duration::from_millis(50), 4);
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = retry_with_reopen(&pool, endpoints("idx"), true, 3, |_handle| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Engine(EngineError::StaleSnapshot)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_with_reopen_does_not_retry_non_retriable_errors() {
        let pool = DatabasePool::new(Duration::from_millis(50), 4);
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = retry_with_reopen(&pool, endpoints("idx"), true, 3, |_handle| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Engine(EngineError::NotFound(1))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
