//! WebSocket server: accept loop and per-subscriber session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each connection to a WebSocket, refusing any path other than
//!    the configured one with `404 Not Found`.
//! 3. Registering the new subscriber with the [`Broadcaster`], which queues
//!    its initial snapshot.
//! 4. Running two tasks per subscriber:
//!    - **Writer**: drains the outbound queue into JSON text frames, each
//!      write bounded by `send_timeout`.
//!    - **Reader**: consumes inbound frames only to notice that the browser
//!      went away.
//! 5. Removing the subscriber when either task ends.
//! 6. Closing every subscriber when shutdown is signalled.
//!
//! # Who closes the socket?
//!
//! The broadcaster never touches sockets.  When it drops a subscriber (slow
//! consumer, shutdown) the outbound queue closes, the writer sends a Close
//! frame and exits, and the session cleans up.  When the browser leaves
//! first, the reader exits and the session removes the subscriber itself.
//! Either way removal happens once; the second attempt is a no-op.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::broadcaster::Broadcaster;
use crate::application::registry::Subscriber;
use crate::domain::config::GatewayConfig;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.ws_bind_addr` and serves subscribers until `shutdown`
/// becomes `true`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    config: GatewayConfig,
    broadcaster: Arc<Broadcaster>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;

    serve(listener, config, broadcaster, shutdown).await
}

/// Runs the accept loop on an already-bound listener.
///
/// On shutdown every registered subscriber is removed, which makes each
/// session's writer send a Close frame.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn serve(
    listener: TcpListener,
    config: GatewayConfig,
    broadcaster: Arc<Broadcaster>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    info!(
        "pairing gateway listening on ws://{local_addr}{}",
        config.ws_path
    );

    let config = Arc::new(config);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    debug!("new connection from {peer_addr}");
                    let cfg = Arc::clone(&config);
                    let bc = Arc::clone(&broadcaster);
                    tokio::spawn(async move {
                        handle_subscriber_session(stream, peer_addr, cfg, bc).await;
                    });
                }
                Err(e) => {
                    // Transient accept error (e.g., too many open file descriptors).
                    error!("accept error: {e}");
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("shutdown signalled; stopping accept loop");
    broadcaster.close_all();
    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_subscriber_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<GatewayConfig>,
    broadcaster: Arc<Broadcaster>,
) {
    match run_session(raw_stream, peer_addr, config, broadcaster).await {
        Ok(()) => info!("session {peer_addr} closed"),
        Err(e) => warn!("session {peer_addr} ended with error: {e:#}"),
    }
}

/// Runs one subscriber from handshake to removal.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails, including upgrades to
/// the wrong path.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<GatewayConfig>,
    broadcaster: Arc<Broadcaster>,
) -> anyhow::Result<()> {
    // ── Step 1: Handshake, path check ─────────────────────────────────────────
    let expected_path = config.ws_path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected_path {
            Ok(response)
        } else {
            Err(not_found(request.uri().path()))
        }
    };
    let ws_stream = accept_hdr_async(raw_stream, check_path)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // ── Step 2: Register ──────────────────────────────────────────────────────
    let (subscriber, mut outbound_rx) =
        Subscriber::channel(peer_addr.to_string(), config.outbound_buffer);
    let id = subscriber.id();
    let (mut ws_write, mut ws_read) = ws_stream.split();

    if !broadcaster.add_subscriber(subscriber) {
        let _ = ws_write.send(WsMessage::Close(None)).await;
        return Ok(());
    }

    // ── Step 3: Writer ────────────────────────────────────────────────────────
    let send_timeout = config.send_timeout;
    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("subscriber {id}: failed to serialise {}: {e}", message.kind());
                    continue;
                }
            };

            match timeout(send_timeout, ws_write.send(WsMessage::Text(json))).await {
                Ok(Ok(())) => debug!("subscriber {id}: sent {}", message.kind()),
                Ok(Err(e)) => {
                    debug!("subscriber {id}: write failed: {e}");
                    return;
                }
                Err(_) => {
                    warn!("subscriber {id}: write timed out after {send_timeout:?}");
                    return;
                }
            }
        }

        // Queue closed: the broadcaster dropped this subscriber.
        let _ = timeout(send_timeout, ws_write.send(WsMessage::Close(None))).await;
    });

    // ── Step 4: Reader ────────────────────────────────────────────────────────
    let mut reader = tokio::spawn(async move {
        while let Some(frame) = ws_read.next().await {
            match frame {
                Ok(WsMessage::Close(_)) => {
                    debug!("subscriber {id}: close frame received");
                    break;
                }
                Ok(_) => {
                    // No inbound protocol; payloads are ignored.
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                Err(e) => {
                    debug!("subscriber {id}: read error: {e}");
                    break;
                }
            }
        }
    });

    // ── Step 5: Wait for either side, then clean up ───────────────────────────
    tokio::select! {
        _ = &mut writer => {
            debug!("subscriber {id}: writer ended");
            reader.abort();
        }
        _ = &mut reader => {
            debug!("subscriber {id}: reader ended");
            writer.abort();
        }
    }

    broadcaster.remove_subscriber(id);
    Ok(())
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("no WebSocket endpoint at {path}")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

// ── Tests ─────────────────────────────────────────────────────────────────────
