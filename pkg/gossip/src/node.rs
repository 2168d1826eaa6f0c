use std::net::Ipv4Addr;
use std::time::Instant;

/// spec.md §3 "Node". Name comparison is case-insensitive throughout this
/// crate; callers should key tables on `name.to_lowercase()`
/// (`stringtolower` in `examples/original_source/discovery.cc`).
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub addr: Ipv4Addr,
    pub http_port: u16,
    pub binary_port: u16,
    pub region: u16,
    pub touched: Instant,
    pub active: bool,
}

impl Node {
    pub fn new(name: String, addr: Ipv4Addr, http_port: u16, binary_port: u16, region: u16, now: Instant) -> Self {
        Node { name, addr, http_port, binary_port, region, touched: now, active: true }
    }

    /// Whether `other` describes the exact same physical endpoint as this
    /// node (address + both ports) — the comparison `discovery.cc` performs
    /// before deciding WAVE vs SNEER.
    pub fn same_endpoint(&self, addr: Ipv4Addr, http_port: u16, binary_port: u16) -> bool {
        self.addr == addr && self.http_port == http_port && self.binary_port == binary_port
    }
}

pub fn key(name: &str) -> String {
    name.to_lowercase()
}

/// Generates a random node name for auto-naming on startup / after SNEER
/// (spec.md §6 "a node with an empty configured name auto-generates one and
/// retries on SNEER").
pub fn name_generator() -> String {
    use rand::Rng;
    const ADJECTIVES: &[&str] = &["quiet", "amber", "lucid", "brisk", "solar", "civic", "rapid", "vivid"];
    const NOUNS: &[&str] = &["falcon", "harbor", "cipher", "meadow", "ember", "quartz", "delta", "basin"];
    let mut rng = rand::thread_rng();
    format!(
        "{}-{}-{}",
        ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())],
        NOUNS[rng.gen_range(0..NOUNS.len())],
        rng.gen_range(100..999)
    )
}
