use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use parley_types::models::Identity;

use crate::Gateway;
use crate::auth::CredentialVerifier;
use crate::error::GatewayError;
use crate::liveness::LivenessMonitor;
use crate::registry::{ChannelId, Outbound};
use crate::relay::MessageRelay;

/// Drive one WebSocket channel from open to teardown.
///
/// `token` is the value of the handshake's `token` cookie, if any. A missing
/// or invalid token leaves the channel open but anonymous.
pub async fn handle_connection(socket: WebSocket, gateway: Gateway, token: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let channel = gateway.registry.admit(tx.clone()).await;
    let monitor = LivenessMonitor::start(
        channel,
        tx,
        gateway.registry.clone(),
        gateway.presence.clone(),
        &gateway.config,
    );
    info!("Channel {} opened", channel);
    gateway.presence.announce().await;

    match resolve_identity(gateway.verifier.clone(), token).await {
        Ok(identity) => {
            let label = format!("{} ({})", identity.username, identity.user_id);
            if gateway.registry.resolve_identity(channel, identity).await {
                info!("Channel {} identified as {}", channel, label);
                gateway.presence.announce().await;
            }
        }
        Err(e) => info!("Channel {} stays anonymous: {}", channel, e),
    }

    // Forward queued frames -> client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let msg = match frame {
                Outbound::Text(text) => Message::Text(text.into()),
                Outbound::Ping => Message::Ping(Bytes::new()),
                Outbound::Close => break,
            };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Relay inbound messages in arrival order without holding up the reader,
    // so pongs are never queued behind a slow persistence call.
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
    let mut relay_task = tokio::spawn(relay_loop(gateway.relay.clone(), channel, inbound_rx));

    // Read frames from client
    let recv_monitor = monitor.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if inbound_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Message::Pong(_) => {
                    if !recv_monitor.on_pong() {
                        trace!("Channel {} unsolicited pong", channel);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for any task to finish
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            relay_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            relay_task.abort();
        }
        _ = &mut relay_task => {
            send_task.abort();
            recv_task.abort();
        }
    }

    monitor.on_closed().await;
    info!("Channel {} closed", channel);
}

/// Verify the handshake token in its own task, so a panicking verifier
/// cannot take the connection down with it.
async fn resolve_identity(
    verifier: Arc<dyn CredentialVerifier>,
    token: Option<String>,
) -> Result<Identity, GatewayError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(GatewayError::InvalidToken)?;

    tokio::spawn(async move { verifier.verify_token(&token).await })
        .await
        .unwrap_or_else(|e| {
            warn!("Token verification aborted: {}", e);
            Err(GatewayError::InvalidToken)
        })
}

async fn relay_loop(relay: MessageRelay, channel: ChannelId, mut inbound: mpsc::UnboundedReceiver<String>) {
    while let Some(payload) = inbound.recv().await {
        match relay.handle_inbound(channel, &payload).await {
            Ok(delivery) => trace!(
                "Channel {} relayed {} to {} channels",
                channel, delivery.message.id, delivery.channels
            ),
            Err(GatewayError::MalformedPayload(reason)) => {
                debug!(
                    "Channel {} dropped payload: {} -- raw: {}",
                    channel,
                    reason,
                    truncate(&payload, 200)
                );
            }
            Err(e @ GatewayError::Persistence(_)) => error!("Channel {} relay failed: {}", channel, e),
            Err(e) => warn!("Channel {} relay failed: {}", channel, e),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
