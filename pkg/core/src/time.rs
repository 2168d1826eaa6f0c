//! Monotonic timestamp helpers shared by gossip liveness (`Node.touched`,
//! spec.md §3) and the resolver's wake scheduling (spec.md §4.I).

use std::time::{Duration, Instant};

/// Wall-clock-free "touched" timestamp: an `Instant` relative to process
/// start. Nodes and resolver entries only ever compare these to each other
/// or to `Instant::now()`, never serialize them, so monotonic time is
/// sufficient and avoids clock-skew issues across the cluster.
pub type Touched = Instant;

pub fn has_aged_past(touched: Touched, timeout: Duration) -> bool {
    touched.elapsed() >= timeout
}
