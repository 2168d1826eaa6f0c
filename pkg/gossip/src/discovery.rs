use std::net::Ipv4Addr;
use std::time::Instant;

use crate::message::{GossipMessage, Kind, PROTO_VERSION};
use crate::node::{key, name_generator, Node};
use crate::table::NodeTable;

/// Outcome of feeding one inbound datagram to [`Discovery`]. `reply` (if
/// any) should be unicast back to the sender; `broadcast` (if any) should go
/// out on the multicast group.
#[derive(Debug, Default)]
pub struct Outcome {
    pub reply: Option<GossipMessage>,
    pub broadcast: Option<GossipMessage>,
    /// Set when a SNEER forced us to regenerate our own name (only possible
    /// when we started with an auto-generated one).
    pub renamed: Option<String>,
    /// Set when a SNEER told us our *configured* name collides; the caller
    /// should shut the process down (spec.md §6 "a user-configured name that
    /// collides is fatal").
    pub shutdown_requested: bool,
}

/// Drives the HELLO/WAVE/SNEER/PING/PONG/BYE handshake described in
/// spec.md §4.G, grounded on `examples/original_source/discovery.cc`.
pub struct Discovery {
    pub cluster_name: String,
    pub self_name: String,
    pub name_is_generated: bool,
    pub addr: Ipv4Addr,
    pub http_port: u16,
    pub binary_port: u16,
    pub region: u16,
    pub pid: u32,
    pub table: NodeTable,
}

impl Discovery {
    pub fn new(
        cluster_name: String,
        configured_name: Option<String>,
        addr: Ipv4Addr,
        http_port: u16,
        binary_port: u16,
        region: u16,
        pid: u32,
    ) -> Self {
        let (self_name, name_is_generated) = match configured_name {
            Some(n) => (n, false),
            None => (name_generator(), true),
        };
        Discovery {
            cluster_name,
            self_name,
            name_is_generated,
            addr,
            http_port,
            binary_port,
            region,
            pid,
            table: NodeTable::new(),
        }
    }

    fn envelope(&self, kind: Kind) -> GossipMessage {
        GossipMessage {
            kind,
            proto_version: PROTO_VERSION,
            cluster_name: self.cluster_name.clone(),
            addr: self.addr,
            http_port: self.http_port,
            binary_port: self.binary_port,
            node_name: self.self_name.clone(),
            pid: self.pid,
        }
    }

    /// Announces the local node on the multicast group at startup.
    pub fn hello(&self) -> GossipMessage {
        self.envelope(Kind::Hello)
    }

    pub fn bye(&self) -> GossipMessage {
        self.envelope(Kind::Bye)
    }

    pub fn ping(&self) -> GossipMessage {
        self.envelope(Kind::Ping)
    }

    /// Processes one inbound datagram already decoded into a
    /// [`GossipMessage`]. `now` drives liveness bookkeeping.
    pub fn handle(&mut self, msg: GossipMessage, now: Instant) -> Outcome {
        if msg.cluster_name != self.cluster_name {
            return Outcome::default();
        }
        if key(&msg.node_name) == key(&self.self_name) && msg.kind != Kind::Sneer {
            // Loopback of our own broadcast.
            return Outcome::default();
        }

        match msg.kind {
            Kind::Hello => self.on_hello(msg, now),
            Kind::Wave => self.on_wave(msg, now),
            Kind::Sneer => self.on_sneer(msg),
            Kind::Ping => self.on_ping(msg, now),
            Kind::Pong => self.on_pong(msg, now),
            Kind::Bye => self.on_bye(msg),
        }
    }

    fn on_hello(&mut self, msg: GossipMessage, now: Instant) -> Outcome {
        if self.table.name_conflicts(&msg.node_name, msg.addr, msg.http_port, msg.binary_port) {
            return Outcome {
                reply: Some(self.envelope(Kind::Sneer)),
                ..Outcome::default()
            };
        }

        self.table.upsert(Node::new(
            msg.node_name,
            msg.addr,
            msg.http_port,
            msg.binary_port,
            self.region,
            now,
        ));

        // Every recipient answers a HELLO with its own WAVE so the new node
        // learns the whole table quickly (discovery.cc broadcasts WAVE in
        // response rather than unicasting, so newcomers converge in one
        // round trip regardless of arrival order).
        Outcome {
            broadcast: Some(self.envelope(Kind::Wave)),
            ..Outcome::default()
        }
    }

    fn on_wave(&mut self, msg: GossipMessage, now: Instant) -> Outcome {
        // Unlike HELLO, a conflicting WAVE never elicits SNEER (SNEER is
        // only reachable from HELLO in discovery.cc's DISCOVERY_WAVE case) —
        // a WAVE whose address changed legitimately just updates the table.
        self.table.upsert(Node::new(
            msg.node_name,
            msg.addr,
            msg.http_port,
            msg.binary_port,
            self.region,
            now,
        ));
        Outcome::default()
    }

    fn on_sneer(&mut self, msg: GossipMessage) -> Outcome {
        if key(&msg.node_name) != key(&self.self_name) {
            // A SNEER aimed at a name collision between two other nodes; not
            // our problem.
            return Outcome::default();
        }

        if self.name_is_generated {
            let new_name = name_generator();
            tracing::warn!(old = %self.self_name, new = %new_name, "name collision, regenerating");
            self.self_name = new_name.clone();
            Outcome {
                broadcast: Some(self.envelope(Kind::Hello)),
                renamed: Some(new_name),
                ..Outcome::default()
            }
        } else {
            tracing::error!(name = %self.self_name, "configured node name collides with an active cluster member");
            Outcome {
                shutdown_requested: true,
                ..Outcome::default()
            }
        }
    }

    fn on_ping(&mut self, msg: GossipMessage, now: Instant) -> Outcome {
        self.table.touch(&msg.node_name, now);
        Outcome {
            reply: Some(self.envelope(Kind::Pong)),
            ..Outcome::default()
        }
    }

    fn on_pong(&mut self, msg: GossipMessage, now: Instant) -> Outcome {
        self.table.touch(&msg.node_name, now);
        Outcome::default()
    }

    fn on_bye(&mut self, msg: GossipMessage) -> Outcome {
        self.table.remove(&msg.node_name);
        Outcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(cluster: &str, name: &str, kind: Kind) -> GossipMessage {
        GossipMessage {
            kind,
            proto_version: PROTO_VERSION,
            cluster_name: cluster.into(),
            addr: Ipv4Addr::new(10, 0, 0, 2),
            http_port: 8880,
            binary_port: 8881,
            node_name: name.into(),
            pid: 1,
        }
    }

    fn discovery(name: &str) -> Discovery {
        Discovery::new(
            "prod".into(),
            Some(name.into()),
            Ipv4Addr::new(10, 0, 0, 1),
            8880,
            8881,
            0,
            100,
        )
    }

    #[test]
    fn seed_test_3_hello_then_sneer() {
        // spec.md §8 seed test 3: HELLO from a name already claimed by a
        // different endpoint elicits SNEER, not WAVE.
        let now = Instant::now();
        let mut d = discovery("alpha");
        let claim = peer("prod", "bravo", Kind::Hello);
        let out = d.handle(claim, now);
        assert!(out.reply.is_none());
        assert!(out.broadcast.is_some());
        assert_eq!(out.broadcast.unwrap().kind, Kind::Wave);

        let mut imposter = peer("prod", "bravo", Kind::Hello);
        imposter.addr = Ipv4Addr::new(10, 0, 0, 99);
        let out2 = d.handle(imposter, now);
        assert!(out2.reply.is_some());
        assert_eq!(out2.reply.unwrap().kind, Kind::Sneer);
    }

    #[test]
    fn configured_name_conflict_requests_shutdown() {
        let now = Instant::now();
        let mut d = discovery("alpha");
        d.table.upsert(Node::new("bravo".into(), Ipv4Addr::new(10, 0, 0, 2), 8880, 8881, 0, now));

        let mut sneer = peer("prod", "alpha", Kind::Sneer);
        sneer.node_name = "alpha".into();
        let out = d.handle(sneer, now);
        assert!(out.shutdown_requested);
    }

    #[test]
    fn generated_name_conflict_renames_and_rebroadcasts() {
        let now = Instant::now();
        let mut d = Discovery::new("prod".into(), None, Ipv4Addr::new(10, 0, 0, 1), 8880, 8881, 0, 1);
        let old_name = d.self_name.clone();
        let mut sneer = peer("prod", &old_name, Kind::Sneer);
        sneer.node_name = old_name.clone();
        let out = d.handle(sneer, now);
        assert!(out.renamed.is_some());
        assert_ne!(out.renamed.unwrap(), old_name);
        assert!(out.broadcast.is_some());
        assert_eq!(out.broadcast.unwrap().kind, Kind::Hello);
    }

    #[test]
    fn ping_pong_is_idempotent_beyond_touched() {
        let now = Instant::now();
        let mut d = discovery("alpha");
        d.table.upsert(Node::new("bravo".into(), Ipv4Addr::new(10, 0, 0, 2), 8880, 8881, 0, now));

        for _ in 0..5 {
            let out = d.handle(peer("prod", "bravo", Kind::Ping), now);
            assert_eq!(out.reply.unwrap().kind, Kind::Pong);
        }
        assert_eq!(d.table.len(), 1);
    }

    #[test]
    fn bye_removes_node() {
        let now = Instant::now();
        let mut d = discovery("alpha");
        d.table.upsert(Node::new("bravo".into(), Ipv4Addr::new(10, 0, 0, 2), 8880, 8881, 0, now));
        d.handle(peer("prod", "bravo", Kind::Bye), now);
        assert!(d.table.get("bravo").is_none());
    }

    #[test]
    fn ignores_other_clusters() {
        let now = Instant::now();
        let mut d = discovery("alpha");
        let out = d.handle(peer("staging", "bravo", Kind::Hello), now);
        assert!(out.reply.is_none());
        assert!(out.broadcast.is_none());
        assert!(d.table.get("bravo").is_none());
    }
}
