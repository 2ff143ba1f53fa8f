use std::sync::Arc;
use std::time::Instant;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use warp::hyper::HeaderMap;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

use crate::core::connection::ConnectionState;
use crate::core::message::UserId;
use crate::core::message_handler::Dispatch;
use crate::handlers::admission::Unauthorized;
use crate::handlers::routes::SharedAppState;

/// Resolve the caller's identity, then upgrade. Unresolved identities never
/// reach the registry.
pub async fn upgrade(ws: Ws, headers: HeaderMap, state: SharedAppState) -> Result<impl Reply, Rejection> {
    let user_id = match state.sessions.resolve(&headers).await {
        Ok(user_id) => user_id,
        Err(e) => {
            debug!("Refusing websocket upgrade: {}", e);
            return Err(warp::reject::custom(Unauthorized));
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_ws_client(socket, user_id, state)))
}

// Drive one connection from registration to close
pub async fn handle_ws_client(ws: WebSocket, user_id: UserId, state: SharedAppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut lifecycle = ConnectionState::Connecting;

    // Forward queued frames to the socket; a failed write ends the writer,
    // which marks the connection closed for every holder of its handle
    tokio::task::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = message.is_close();
            if let Err(e) = ws_tx.send(message).await {
                debug!("WebSocket write failed for user {}: {}", user_id, e);
                break;
            }
            if closing {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    lifecycle = advance(lifecycle, ConnectionState::Registered, user_id);
    let connection = state.hub.connect(user_id, tx).await;
    lifecycle = advance(lifecycle, ConnectionState::Serving, user_id);

    let keep_alive = state.keep_alive.clone();
    let mut ping = tokio::time::interval(keep_alive.ping_interval);
    ping.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error for user {}: {}", user_id, e);
                        break;
                    }
                    None => break,
                };
                last_seen = Instant::now();

                if msg.is_close() {
                    break;
                }
                // Pings are answered by the transport; pongs only refresh last_seen
                let Ok(text) = msg.to_str() else {
                    continue;
                };
                if state.handler.handle_text(&connection, text).await == Dispatch::Close {
                    info!("User {} closed connection {}", user_id, connection.id);
                    break;
                }
            }
            _ = ping.tick() => {
                if last_seen.elapsed() > keep_alive.idle_timeout {
                    info!("User {} idle for {:?}, closing", user_id, last_seen.elapsed());
                    break;
                }
                if connection.is_closed() || connection.send(Message::ping(Vec::new())).is_err() {
                    break;
                }
            }
        }
    }

    lifecycle = advance(lifecycle, ConnectionState::Closing, user_id);
    state.hub.disconnect(&connection).await;
    connection.close();
    advance(lifecycle, ConnectionState::Closed, user_id);
}

fn advance(current: ConnectionState, next: ConnectionState, user_id: UserId) -> ConnectionState {
    match current.advance(next) {
        Ok(state) => {
            debug!("User {} connection {} -> {}", user_id, current, state);
            state
        }
        Err(e) => {
            error!("User {}: {}", user_id, e);
            next
        }
    }
}

// Shared app state is cheap to clone into per-connection tasks
pub fn with_state(
    state: SharedAppState,
) -> impl Filter<Extract = (SharedAppState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}
