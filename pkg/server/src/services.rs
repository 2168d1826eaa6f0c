use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};

use crate::config::{Cli, ClusterConfig};

/// The single shared handle passed by reference to every layer (spec.md §9
/// "Cyclic references": "a single shared `services` handle ... tasks hold
/// strong references to the services handle, not to parents"). Everything
/// that would otherwise need a back-reference to "the node" instead takes
/// an `Arc<Services>`.
pub struct Services {
    pub config: ClusterConfig,
    pub self_addr: Ipv4Addr,
    pub http_port: u16,
    pub binary_port: u16,

    pub resolver: resolver::EndpointResolver,
    pub schema: schema::SchemaRegistry,
    pub pool: store::DatabasePool,

    /// This node's region election. Single entry because each process
    /// belongs to exactly one region (spec.md §4.H); a multi-region
    /// deployment runs one process per region.
    pub raft: Mutex<raft::Raft>,

    /// Broadcast channel the resolver hands paths to when a fresh lookup
    /// needs a cluster-wide DB-lookup kicked off (spec.md §4.I "NEW:
    /// broadcast DB-lookup"). `pkg/server`'s gossip-broadcast task drains
    /// this and republishes over the multicast group; nothing in this
    /// crate depends on gossip's wire format directly.
    pub lookup_broadcast: mpsc::Sender<String>,

    pub data_dir: std::path::PathBuf,
}

impl Services {
    pub fn new(cli: &Cli, self_addr: Ipv4Addr, self_name: String, lookup_broadcast: mpsc::Sender<String>) -> Arc<Services> {
        let config = ClusterConfig::from(cli);
        let raft = raft::Raft::new(self_name, cli.region, Instant::now());

        Arc::new(Services {
            config,
            self_addr,
            http_port: cli.http_port,
            binary_port: cli.binary_port,
            resolver: resolver::EndpointResolver::new(cli.resolver_init_timeout(), cli.resolver_overall_timeout()),
            schema: schema::SchemaRegistry::new(),
            pool: store::DatabasePool::new(cli.checkout_timeout(), cli.read_only_pool_cap)
                .with_data_dir(cli.data_dir.clone()),
            raft: Mutex::new(raft),
            lookup_broadcast,
            data_dir: cli.data_dir.clone(),
        })
    }

    /// Recomputes the election's view of cluster membership from the
    /// gossip node table. Called after every table mutation (spec.md §4.H
    /// "membership changes are driven by gossip").
    pub async fn sync_raft_membership(&self, members: impl IntoIterator<Item = String>) {
        self.raft.lock().await.set_members(members);
    }

    /// Runs the per-region election timer. Exits when `shutdown` fires.
    pub async fn run_raft_ticker(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_millis(50));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let mut raft = self.raft.lock().await;
                    let now = Instant::now();
                    let outbound = raft.tick(now);
                    if !outbound.is_empty() {
                        tracing::trace!(count = outbound.len(), role = ?raft.role(), "raft tick produced messages");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
