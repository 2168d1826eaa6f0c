use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

use crate::discovery::Discovery;
use crate::message::GossipMessage;
use crate::table::NODE_TIMEOUT;

const MAX_DATAGRAM: usize = 2048;
const PING_SWEEP_PERIOD: Duration = Duration::from_secs(20);
const AGE_SWEEP_PERIOD: Duration = Duration::from_secs(10);

/// Events surfaced to the owning process. `pkg/server` listens on this
/// channel to react to renames (update its own advertised name) and fatal
/// name collisions (exit cleanly).
#[derive(Debug)]
pub enum ServiceEvent {
    Renamed(String),
    ShutdownRequested,
}

/// Binds a multicast UDP socket and drives [`Discovery`] against it.
/// Grounded on the connection-handling style of
/// `examples/dennisss-repo/pkg/haystack/src/http.rs` (spawned task per I/O
/// source, bounded channel for events the caller must react to).
pub struct GossipService {
    socket: UdpSocket,
    group: SocketAddrV4,
    discovery: Discovery,
}

impl GossipService {
    pub async fn bind(
        bind_addr: Ipv4Addr,
        group: SocketAddrV4,
        discovery: Discovery,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((bind_addr, group.port())).await?;
        socket.join_multicast_v4(*group.ip(), bind_addr)?;
        socket.set_multicast_loop_v4(false)?;
        Ok(GossipService { socket, group, discovery })
    }

    async fn send(&self, msg: &GossipMessage) -> std::io::Result<()> {
        self.socket.send_to(&msg.encode(), self.group).await?;
        Ok(())
    }

    async fn send_to(&self, msg: &GossipMessage, addr: std::net::SocketAddr) -> std::io::Result<()> {
        self.socket.send_to(&msg.encode(), addr).await?;
        Ok(())
    }

    /// Runs until the socket errors or `shutdown` fires. Publishes
    /// [`ServiceEvent`]s on `events` for the parts of the process that need
    /// to react (renamed self, fatal collision). On shutdown, announces
    /// BYE (spec.md §4.K) before returning.
    pub async fn run(
        mut self,
        events: mpsc::Sender<ServiceEvent>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        self.send(&self.discovery.hello()).await?;

        let mut ping_sweep = tokio::time::interval(PING_SWEEP_PERIOD);
        let mut age_sweep = tokio::time::interval(AGE_SWEEP_PERIOD);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                res = self.socket.recv_from(&mut buf) => {
                    let (len, from) = res?;
                    let Ok(msg) = GossipMessage::decode(&buf[..len]) else { continue };
                    let now = TokioInstant::now().into_std();
                    let outcome = self.discovery.handle(msg, now);

                    if let Some(reply) = outcome.reply {
                        let _ = self.send_to(&reply, from).await;
                    }
                    if let Some(broadcast) = outcome.broadcast {
                        let _ = self.send(&broadcast).await;
                    }
                    if let Some(name) = outcome.renamed {
                        let _ = events.send(ServiceEvent::Renamed(name)).await;
                    }
                    if outcome.shutdown_requested {
                        let _ = events.send(ServiceEvent::ShutdownRequested).await;
                        let _ = self.leave().await;
                        return Ok(());
                    }
                }
                _ = ping_sweep.tick() => {
                    let _ = self.send(&self.discovery.ping()).await;
                }
                _ = age_sweep.tick() => {
                    let now = TokioInstant::now().into_std();
                    let gone = self.discovery.table.age(now, NODE_TIMEOUT);
                    for name in gone {
                        tracing::info!(%name, "node timed out");
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        let _ = self.leave().await;
                        return Ok(());
                    }
                }
            }
        }
    }

    pub async fn leave(&self) -> std::io::Result<()> {
        self.send(&self.discovery.bye()).await
    }
}
