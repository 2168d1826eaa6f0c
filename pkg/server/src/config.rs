use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Startup configuration, assembled from CLI flags (SPEC_FULL.md §2
/// "Configuration": "a startup config struct assembled from CLI flags via
/// `clap` (derive API)"). Mirrors `raft/src/main.rs`'s `clap` usage in the
/// teacher, ported from the builder API to the derive API.
#[derive(Debug, Clone, Parser)]
#[command(name = "searchd", about = "Distributed multi-protocol search/indexing node")]
pub struct Cli {
    /// HTTP listen port.
    #[arg(long, default_value_t = 8880)]
    pub http_port: u16,

    /// Binary protocol listen port.
    #[arg(long, default_value_t = 8881)]
    pub binary_port: u16,

    /// Gossip multicast group address.
    #[arg(long, default_value = "239.255.12.12")]
    pub gossip_group: Ipv4Addr,

    /// Gossip multicast port.
    #[arg(long, default_value_t = 8890)]
    pub gossip_port: u16,

    /// Local bind address (also advertised to peers).
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_addr: Ipv4Addr,

    /// Cluster name; nodes in different clusters ignore each other's
    /// gossip traffic.
    #[arg(long, default_value = "searchd")]
    pub cluster_name: String,

    /// Node name; empty auto-generates one and retries on SNEER (spec.md
    /// §6 "a node with an empty configured name auto-generates one").
    #[arg(long, default_value = "")]
    pub node_name: String,

    /// Raft region id this node participates in.
    #[arg(long, default_value_t = 0)]
    pub region: u16,

    /// Data directory for WAL volumes and staged replication transfers.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Writable-pool checkout timeout, milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub checkout_timeout_ms: u64,

    /// Soft cap on concurrently checked-out read-only shard handles.
    #[arg(long, default_value_t = 8)]
    pub read_only_pool_cap: u32,

    /// Resolver per-lookup init timeout, milliseconds.
    #[arg(long, default_value_t = 100)]
    pub resolver_init_timeout_ms: u64,

    /// Resolver per-lookup overall timeout, milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub resolver_overall_timeout_ms: u64,

    /// Grace window for draining in-flight clients during shutdown stage
    /// one (spec.md §4.K "Shutdown").
    #[arg(long, default_value_t = 5_000)]
    pub shutdown_grace_ms: u64,
}

impl Cli {
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }

    pub fn resolver_init_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_init_timeout_ms)
    }

    pub fn resolver_overall_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_overall_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Immutable process-wide configuration shared (via `Arc`) across gossip,
/// resolver, and raft (SPEC_FULL.md §3's `ClusterConfig` addition).
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub region: u16,
    pub gossip_group: Ipv4Addr,
    pub gossip_port: u16,
    pub proto_version: u16,
}

impl From<&Cli> for ClusterConfig {
    fn from(cli: &Cli) -> Self {
        ClusterConfig {
            cluster_name: cli.cluster_name.clone(),
            region: cli.region,
            gossip_group: cli.gossip_group,
            gossip_port: cli.gossip_port,
            proto_version: gossip::PROTO_VERSION,
        }
    }
}
