use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// spec.md §4.A "Buffered I/O Client", reworked onto Tokio: the reactor
/// is the multi-threaded runtime, each accepted socket gets its own
/// spawned read-loop task, and this bounded channel stands in for the
/// outbound write queue so `write()` never blocks the caller.
pub struct BufferedClient {
    outbound: mpsc::Sender<Vec<u8>>,
    closed: Arc<AtomicBool>,
    pub peer_addr: SocketAddr,
}

impl BufferedClient {
    /// Splits the socket and spawns the write-loop task; returns the
    /// client handle plus the owned read half for the caller to drive its
    /// own read loop against (the read side is protocol-specific, so it
    /// isn't owned by this type).
    pub fn new(socket: TcpStream, peer_addr: SocketAddr) -> (BufferedClient, OwnedReadHalf) {
        let (read_half, write_half) = socket.into_split();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(write_half, rx, closed.clone()));

        (BufferedClient { outbound: tx, closed, peer_addr }, read_half)
    }

    /// Enqueues `bytes` for the write loop. Returns `false` if the client
    /// is already closed or the queue is full and has been closed by a
    /// slow consumer — never blocks the caller.
    pub fn write(&self, bytes: Vec<u8>) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.outbound.try_send(bytes).is_ok()
    }

    /// Marks the client closed; in-flight queued writes still drain
    /// (spec.md §4.A: "`shutdown()` marks closed but allows the outbound
    /// queue to drain"). Double-close is a no-op.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<Vec<u8>>, closed: Arc<AtomicBool>) {
    while let Some(chunk) = rx.recv().await {
        if write_half.write_all(&chunk).await.is_err() {
            closed.store(true, Ordering::Release);
            return;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Reads into a scratch buffer, handing each chunk to `on_chunk` (spec.md
/// §4.A "Read algorithm"). Returns when the peer closes the socket or a
/// read error occurs; the caller's parser owns the assembled buffer.
pub async fn read_loop(mut read_half: OwnedReadHalf, closed: Arc<AtomicBool>, mut on_chunk: impl FnMut(&[u8]) -> bool) {
    let mut scratch = [0u8; 8192];
    loop {
        if closed.load(Ordering::Acquire) {
            return;
        }
        match read_half.read(&mut scratch).await {
            Ok(0) => return,
            Ok(n) => {
                if !on_chunk(&scratch[..n]) {
                    closed.store(true, Ordering::Release);
                    return;
                }
            }
            Err(_) => {
                closed.store(true, Ordering::Release);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn write_then_shutdown_drains_the_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, _connected) = tokio::try_join!(listener.accept(), TcpStream::connect(addr)).unwrap();
        let (server_sock, peer_addr) = accepted;

        let (client, _read_half) = BufferedClient::new(server_sock, peer_addr);
        assert!(client.write(b"hello".to_vec()));
        client.shutdown();
        assert!(client.is_closed());
        assert!(!client.write(b"late".to_vec()));
    }

    #[tokio::test]
    async fn read_loop_hands_chunks_to_the_callback_until_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, mut client_sock) = tokio::try_join!(listener.accept(), TcpStream::connect(addr)).unwrap();
        let (server_sock, _) = accepted;
        let (read_half, _write_half) = server_sock.into_split();

        client_sock.write_all(b"abc").await.unwrap();
        drop(client_sock);

        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let received_clone = received.clone();
        read_loop(read_half, Arc::new(AtomicBool::new(false)), move |chunk| {
            received_clone.lock().unwrap().extend_from_slice(chunk);
            true
        })
        .await;

        assert_eq!(*received.lock().unwrap(), b"abc");
    }
}
