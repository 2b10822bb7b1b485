//! Per-connection lifecycle: handshake, reader loop, writer task.
//!
//! State machine per connection: Connected → AwaitingHandshake →
//! Registered | Rejected. Only a successful handshake creates a registry
//! entry; a rejected connection is answered with one System frame and
//! closed. Once registered, the reader loop runs until end-of-stream or a
//! read error, which removes the session and lets the writer drain out.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use natter_core::message::now_nanos;
use natter_core::{wire, Message, MessageKind, NatterError, Persister, Result};

use crate::registry::SessionRegistry;
use crate::router;

/// Frames a session's outbound queue holds before further deliveries to it
/// are shed. Bounds what a client that stopped reading can cost the server.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Drive one accepted connection from handshake to disconnect
pub async fn serve(
    stream: TcpStream,
    peer: String,
    registry: Arc<SessionRegistry>,
    persister: Arc<dyn Persister>,
    handshake_timeout: Duration,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let nickname = match handshake(&mut reader, &peer, handshake_timeout).await {
        Ok(nickname) => nickname,
        Err(e) => {
            let _ = writer.shutdown().await;
            return Err(e);
        }
    };

    let (outbound, inbound) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
    if let Err(rejected) = registry.try_register(&peer, &nickname, outbound) {
        let notice = Message::system(rejected.to_string());
        if let Ok(frame) = wire::encode_framed(&notice) {
            let _ = writer.write_all(&frame).await;
        }
        let _ = writer.shutdown().await;
        return Err(rejected.into());
    }

    info!(%peer, %nickname, "session registered");
    tokio::spawn(write_loop(writer, inbound));

    read_loop(&mut reader, &peer, &nickname, &registry, &persister).await;

    // Dropping the registry entry closes the writer's channel, so the writer
    // task drains whatever is queued and exits on its own.
    registry.remove(&peer);
    info!(%peer, %nickname, "session closed");
    Ok(())
}

/// Read and validate the one handshake frame a new connection must send.
/// The timeout bounds the resources a slow or silent client can hold before
/// registering.
async fn handshake(
    reader: &mut OwnedReadHalf,
    peer: &str,
    handshake_timeout: Duration,
) -> Result<String> {
    let payload = match timeout(handshake_timeout, wire::read_frame(reader)).await {
        Ok(Ok(Some(payload))) => payload,
        Ok(Ok(None)) => return Err(NatterError::handshake(peer, "closed before handshake")),
        Ok(Err(e)) => return Err(NatterError::handshake(peer, e.to_string())),
        Err(_) => return Err(NatterError::handshake(peer, "handshake timed out")),
    };

    let hello = wire::decode(&payload).map_err(|e| NatterError::handshake(peer, e.to_string()))?;
    if hello.kind != MessageKind::Handshake {
        return Err(NatterError::handshake(
            peer,
            format!("expected handshake frame, got {:?}", hello.kind),
        ));
    }

    Ok(hello.sender)
}

/// Per-session reader loop; runs until disconnect.
///
/// Malformed frames, wrong kinds, and forged senders are dropped without
/// closing the session. Only a transport-level read failure or end-of-stream
/// ends the loop.
async fn read_loop(
    reader: &mut OwnedReadHalf,
    peer: &str,
    nickname: &str,
    registry: &SessionRegistry,
    persister: &Arc<dyn Persister>,
) {
    loop {
        let payload = match wire::read_frame(reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!(%peer, "peer disconnected");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "read failed, closing session");
                break;
            }
        };

        let mut message = match wire::decode(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(%peer, error = %e, "dropping malformed frame");
                continue;
            }
        };

        if message.kind != MessageKind::Chat {
            warn!(%peer, kind = ?message.kind, "dropping non-chat frame after handshake");
            continue;
        }

        // Spoofing attempt, not a crash condition: drop the frame, keep the
        // session.
        if message.sender != nickname {
            warn!(
                %peer,
                claimed = %message.sender,
                registered = %nickname,
                "dropping frame with forged sender"
            );
            continue;
        }

        message.sent_at_nanos = now_nanos();

        if let Err(e) = persister.persist(&message).await {
            error!(%peer, error = %e, "persist failed, routing anyway");
        }

        match wire::encode_framed(&message) {
            Ok(frame) => router::route(registry, &message, &frame),
            Err(e) => warn!(%peer, error = %e, "re-encode failed, dropping frame"),
        }
    }
}

/// Per-session writer task: the sole writer of outbound frames for one
/// connection. Exits when the channel closes (session removed) or the first
/// write fails.
async fn write_loop(mut writer: OwnedWriteHalf, mut inbound: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = inbound.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!(error = %e, "outbound write failed, stopping writer");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
