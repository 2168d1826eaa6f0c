use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use net::{encode_response, BufferedClient, Frame, FrameDecoder, HttpParser, SWITCH_MARKER};
use replication::{respond_to_get_changesets, Message as ReplMessage};
use resolver::{Endpoint, Protocol};
use store::Endpoints;

use crate::services::Services;

/// Drives one accepted HTTP connection: feed bytes to [`HttpParser`],
/// answer each completed request, and keep the socket open across
/// requests while `keep_alive` holds (spec.md §4.B "HTTP" / §4.K
/// "Accept dispatch").
pub async fn serve_http(stream: TcpStream, peer: SocketAddr, services: Arc<Services>) {
    let (client, read_half) = BufferedClient::new(stream, peer);
    let mut parser = HttpParser::new();

    net::read_loop(read_half, Arc::new(AtomicBool::new(false)), move |chunk| {
        parser.feed(chunk);
        loop {
            match parser.try_parse() {
                Ok(Some(request)) => {
                    let body = status_body(&services, &request.path);
                    let response = encode_response(200, "OK", "application/json", body.as_bytes());
                    if !client.write(response) {
                        return false;
                    }
                    if !request.keep_alive {
                        client.shutdown();
                        return false;
                    }
                }
                Ok(None) => return true,
                Err(_) => {
                    let response = encode_response(400, "Bad Request", "text/plain", b"bad request");
                    let _ = client.write(response);
                    client.shutdown();
                    return false;
                }
            }
        }
    })
    .await;
}

fn status_body(services: &Services, path: &str) -> String {
    format!(
        "{{\"path\":{path:?},\"region\":{},\"http_port\":{},\"binary_port\":{}}}",
        services.config.region, services.http_port, services.binary_port
    )
}

/// Drives one accepted binary-protocol connection. Plain frames are
/// ignored until the peer sends the [`SWITCH_MARKER`] frame (spec.md
/// §4.B: "the next frame's type is reinterpreted as a replication op");
/// from then on every frame is decoded as a [`ReplMessage`] and
/// dispatched against the local shard pool (spec.md §4.J "source role").
pub async fn serve_binary(stream: TcpStream, peer: SocketAddr, services: Arc<Services>) {
    let (client, mut read_half) = BufferedClient::new(stream, peer);
    let mut decoder = FrameDecoder::new();
    let mut replicating = false;
    let mut scratch = [0u8; 8192];

    loop {
        let n = match read_half.read(&mut scratch).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.feed(&scratch[..n]);

        loop {
            let frame = match decoder.try_decode() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_) => {
                    client.shutdown();
                    return;
                }
            };

            if frame.is_switch_marker() {
                replicating = true;
                continue;
            }
            if !replicating {
                continue;
            }

            let Ok(message) = ReplMessage::decode(&frame.payload) else { continue };
            if let ReplMessage::GetChangesets { source_uuid, from_revision, index_path } = message {
                handle_get_changesets(&services, &client, &index_path, source_uuid, from_revision).await;
            }
        }
    }
}

async fn handle_get_changesets(
    services: &Services,
    client: &BufferedClient,
    index_path: &str,
    source_uuid: uuid::Uuid,
    from_revision: u64,
) {
    let endpoints = Endpoints::new([Endpoint {
        protocol: Protocol::File,
        host: String::new(),
        port: 0,
        path: index_path.to_string(),
        mastery_level: 0,
    }]);

    let checkout = match services.pool.checkout(endpoints, false).await {
        Ok(checkout) => checkout,
        Err(err) => {
            let fail = ReplMessage::Fail { message: err.to_string() };
            client.write(Frame::encode(fail.op() as u8, &fail.encode()));
            return;
        }
    };

    let messages = respond_to_get_changesets(checkout.handle.engine(), index_path, source_uuid, from_revision);
    for message in &messages {
        client.write(Frame::encode(message.op() as u8, &message.encode()));
    }
    services.pool.checkin(checkout).await;
}
