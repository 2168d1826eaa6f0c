use std::time::Duration;

use tokio::time::Instant;

use crate::endpoint::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    New,
    Waiting,
    Ready,
    TimedOut,
}

/// spec.md §3 "Resolver entry" / §4.I state table, grounded on
/// `examples/original_source/endpoint_resolver.cc`'s `EndpointList`.
///
/// Deviates from the C++ source in one respect: there, sufficiency
/// (`|candidates| >= N`) is only noticed the next time the timer actually
/// fires, which can leave a satisfied request waiting an extra tick for no
/// reason. Here, reaching sufficiency collapses `next_wake` to "now" so the
/// waiting task re-checks immediately — this is what makes seed test 5's
/// "READY reached at 20ms" exact rather than one growth-step later.
pub struct ResolverEntry {
    pub status: Status,
    init_time: Instant,
    candidates: Vec<Endpoint>,
    max_mastery_seen: i32,
    init_timeout: Duration,
    overall_timeout: Duration,
    next_wake: Instant,
}

impl ResolverEntry {
    pub fn new(now: Instant, init_timeout: Duration, overall_timeout: Duration) -> Self {
        ResolverEntry {
            status: Status::New,
            init_time: now,
            candidates: Vec::new(),
            max_mastery_seen: 0,
            init_timeout,
            overall_timeout,
            next_wake: now,
        }
    }

    /// NEW -> WAITING transition (spec.md §4.I state table).
    pub fn start(&mut self, now: Instant) {
        self.status = Status::Waiting;
        self.init_time = now;
        self.next_wake = now + self.init_timeout;
    }

    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.init_time)
    }

    fn scaled(&self, elapsed: Duration, factor: u32) -> Duration {
        let scaled = elapsed.mul_f64(factor as f64);
        if scaled >= self.overall_timeout {
            self.overall_timeout
        } else {
            scaled
        }
    }

    /// A gossip DB-lookup response arrived. Grounded on
    /// `EndpointList::add_endpoint`: growth factor is 2 (instead of the
    /// default 3) exactly when this reply carries a new maximum mastery
    /// level.
    pub fn add_endpoint(&mut self, endpoint: Endpoint, now: Instant, target: usize) {
        if self.status != Status::Waiting {
            return;
        }

        let mastery = endpoint.mastery_level;
        match self.candidates.iter_mut().find(|e| **e == endpoint) {
            Some(slot) => *slot = endpoint,
            None => self.candidates.push(endpoint),
        }

        let elapsed = self.elapsed(now);
        if elapsed >= self.overall_timeout {
            self.status = Status::TimedOut;
            return;
        }

        if self.candidates.len() >= target {
            self.next_wake = now;
            return;
        }

        let factor = if mastery > self.max_mastery_seen {
            self.max_mastery_seen = mastery;
            2
        } else {
            3
        };
        self.next_wake = self.init_time + self.scaled(elapsed, factor);
    }

    /// `next_wake` was reached with no intervening `add_endpoint` call —
    /// the `ETIMEDOUT` branch of `resolve_endpoint`. Growth factor here is
    /// always 3: this path means no new information arrived at all.
    pub fn on_wake(&mut self, now: Instant, target: usize) {
        if self.status != Status::Waiting {
            return;
        }

        let elapsed = self.elapsed(now);
        if elapsed >= self.overall_timeout {
            self.status = Status::TimedOut;
            return;
        }

        if self.candidates.len() >= target {
            self.status = Status::Ready;
            return;
        }

        self.next_wake = self.init_time + self.scaled(elapsed, 3);
    }

    /// Top `target` candidates, ranked by mastery descending. Mirrors
    /// `_get_endpoints`'s return value: `true` only if at least `target`
    /// candidates were available.
    pub fn collect(&self, target: usize) -> (Vec<Endpoint>, bool) {
        let mut ranked = self.candidates.clone();
        ranked.sort_by(|a, b| b.mastery_level.cmp(&a.mastery_level).then_with(|| a.cmp(b)));
        let out: Vec<Endpoint> = ranked.into_iter().take(target).collect();
        let complete = out.len() >= target;
        (out, complete)
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
    async fn seed_test_5_resolver_timing() {
        let now = Instant::now();
        let mut entry = ResolverEntry::new(now, Duration::from_millis(5), Duration::from_secs(1));
        entry.start(now);
        assert_eq!(entry.next_wake(), now + Duration::from_millis(5));

        let t2 = now + Duration::from_millis(2);
        entry.add_endpoint(ep("a", 0), t2, 3);
        assert_eq!(entry.status, Status::Waiting);
        // elapsed=2ms, mastery=0 does not exceed the initial max of 0, so
        // factor=3 -> 6ms.
        assert_eq!(entry.next_wake(), now + Duration::from_millis(6));

        let t4 = now + Duration::from_millis(4);
        entry.add_endpoint(ep("b", 0), t4, 3);
        assert_eq!(entry.next_wake(), now + Duration::from_millis(12));

        let t20 = now + Duration::from_millis(20);
        entry.add_endpoint(ep("c", 5), t20, 3);
        // Third candidate reached target: next_wake collapses to "now".
        assert_eq!(entry.candidate_count(), 3);
        assert_eq!(entry.next_wake(), t20);
        assert_eq!(entry.status, Status::Waiting);

        entry.on_wake(t20, 3);
        assert_eq!(entry.status, Status::Ready);

        let (ranked, complete) = entry.collect(3);
        assert!(complete);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].host, "c");
        assert_eq!(ranked[0].mastery_level, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_insufficient_candidates() {
        let now = Instant::now();
        let mut entry = ResolverEntry::new(now, Duration::from_millis(5), Duration::from_millis(50));
        entry.start(now);
        entry.add_endpoint(ep("a", 0), now + Duration::from_millis(5), 3);
        entry.on_wake(now + Duration::from_millis(60), 3);
        assert_eq!(entry.status, Status::TimedOut);
    }
}
