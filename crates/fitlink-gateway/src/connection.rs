use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::auth::Identity;
use crate::dispatcher::{Dispatcher, Flow};

/// Run a connection whose credential was already checked at the HTTP
/// upgrade. Returns once the socket is closed and presence is cleaned up.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();

    let (session, mut outbound) = dispatcher.connect(identity).await;
    info!(
        "{} ({:?}) connected to gateway as {}",
        session.user_id(),
        session.role(),
        session.conn_id()
    );

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Writer: drains this connection's outbound queue, with heartbeat
    let heartbeat_interval = dispatcher.heartbeat();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = outbound.recv() => {
                    let Some(event) = event else { break };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode outbound event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: one inbound event at a time, so a sender's messages are
    // stored and forwarded in the order they arrived
    let dispatcher_recv = dispatcher.clone();
    let session_recv = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if dispatcher_recv.handle_frame(&session_recv, text.as_str()).await == Flow::Close {
                        break;
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Close, socket error, heartbeat timeout and logout all end up here
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.disconnect(&session).await;
    info!("{} disconnected from gateway ({})", session.user_id(), session.conn_id());
}
