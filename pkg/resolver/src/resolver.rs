use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;

use crate::endpoint::Endpoint;
use crate::entry::{ResolverEntry, Status};

struct Slot {
    inner: Mutex<ResolverEntry>,
    notify: Notify,
}

/// spec.md §4.I `EndpointResolver`: one long-lived [`ResolverEntry`] per
/// path, reused across requests (`examples/original_source/
/// endpoint_resolver.cc`'s `EndpointResolver` map). Eviction is left to the
/// caller — spec.md leaves eviction policy unspecified beyond "age or
/// pressure".
pub struct EndpointResolver {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    init_timeout: Duration,
    overall_timeout: Duration,
}

impl EndpointResolver {
    pub fn new(init_timeout: Duration, overall_timeout: Duration) -> Self {
        EndpointResolver {
            slots: Mutex::new(HashMap::new()),
            init_timeout,
            overall_timeout,
        }
    }

    async fn slot_for(&self, path: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(path.to_string())
            .or_insert_with(|| {
                Arc::new(Slot {
                    inner: Mutex::new(ResolverEntry::new(Instant::now(), self.init_timeout, self.overall_timeout)),
                    notify: Notify::new(),
                })
            })
            .clone()
    }

    /// Feeds one DB-lookup response into the path's entry. `lookups`
    /// (the channel returned alongside a resolve future, or wired up ahead
    /// of time by the caller) is how gossip's broadcast responses are
    /// expected to route back in.
    pub async fn add_endpoint(&self, path: &str, endpoint: Endpoint, target: usize) {
        let slot = self.slot_for(path).await;
        {
            let mut entry = slot.inner.lock().await;
            entry.add_endpoint(endpoint, Instant::now(), target);
        }
        slot.notify.notify_waiters();
    }

    /// Resolves up to `target` endpoints for `path`. `broadcast` is called
    /// once, only on a fresh (status == NEW) entry, to kick off the
    /// cluster-wide DB-lookup (spec.md §4.I "NEW: broadcast DB-lookup").
    /// Returns the ranked candidates and whether `target` of them were
    /// found before the entry became READY or TIMED_OUT.
    pub async fn resolve(&self, path: &str, target: usize, broadcast: &mpsc::Sender<String>) -> (Vec<Endpoint>, bool) {
        let slot = self.slot_for(path).await;

        {
            let mut entry = slot.inner.lock().await;
            if entry.status == Status::New {
                entry.start(Instant::now());
                let _ = broadcast.send(path.to_string()).await;
            }
        }

        loop {
            let (status, next_wake) = {
                let entry = slot.inner.lock().await;
                (entry.status, entry.next_wake())
            };

            match status {
                Status::Ready | Status::TimedOut => break,
                Status::New => unreachable!("started above"),
                Status::Waiting => {
                    tokio::select! {
                        _ = slot.notify.notified() => {}
                        _ = tokio::time::sleep_until(next_wake) => {
                            let mut entry = slot.inner.lock().await;
                            entry.on_wake(Instant::now(), target);
                        }
                    }
                }
            }
        }

        let entry = slot.inner.lock().await;
        entry.collect(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Protocol;

    fn ep(host: &str, mastery: i32) -> Endpoint {
        Endpoint { protocol: Protocol::Remote, host: host.into(), port: 8000, path: "/idx".into(), mastery_level: mastery }
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_collects_ranked_candidates_across_arrivals() {
        let resolver = Arc::new(EndpointResolver::new(Duration::from_millis(5), Duration::from_secs(1)));
        let (tx, mut rx) = mpsc::channel(8);

        let r = resolver.clone();
        let handle = tokio::spawn(async move { r.resolve("/idx", 3, &tx).await });

        // Let the resolve task register NEW -> WAITING and issue the broadcast request.
        tokio::task::yield_now().await;
        assert_eq!(rx.recv().await.unwrap(), "/idx");

        tokio::time::advance(Duration::from_millis(2)).await;
        resolver.add_endpoint("/idx", ep("a", 0), 3).await;
        tokio::time::advance(Duration::from_millis(2)).await;
        resolver.add_endpoint("/idx", ep("b", 0), 3).await;
        tokio::time::advance(Duration::from_millis(16)).await;
        resolver.add_endpoint("/idx", ep("c", 5), 3).await;

        let (ranked, complete) = handle.await.unwrap();
        assert!(complete);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].host, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_path_times_out_without_hanging() {
        let resolver = Arc::new(EndpointResolver::new(Duration::from_millis(5), Duration::from_millis(30)));
        let (tx, mut rx) = mpsc::channel(8);
        let r = resolver.clone();
        let handle = tokio::spawn(async move { r.resolve("/none", 2, &tx).await });
        assert_eq!(rx.recv().await.unwrap(), "/none");
        tokio::time::advance(Duration::from_millis(50)).await;
        let (ranked, complete) = handle.await.unwrap();
        assert!(!complete);
        assert!(ranked.is_empty());
    }
}
