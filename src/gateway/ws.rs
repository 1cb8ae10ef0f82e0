//! WebSocket endpoint for the realtime gateway.
//!
//! Identity is resolved before the upgrade, so anonymous callers get a
//! plain 401 and no socket. Each connection then runs one loop that either
//! applies an inbound frame to completion or forwards the next hub event.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::http::auth::Identity;
use crate::http::AppState;
use crate::hub::events::OutboundEvent;
use crate::Result;

use super::session::GatewaySession;

/// `GET /ws/operations/` upgrade handler.
///
/// # Errors
///
/// Returns `AppError::Closed` if the server is shutting down.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Response> {
    let session = GatewaySession::open(state.dispatch.clone(), user)?;
    info!(
        user_id = %session.user().id,
        channel = %session.channel(),
        "websocket connection request"
    );

    Ok(ws
        .max_message_size(state.config.realtime.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, session)))
}

/// Run one connection until the client leaves or the hub shuts down.
async fn handle_socket(socket: WebSocket, mut session: GatewaySession) {
    let user_id = session.user().id.clone();
    let (mut sender, mut receiver) = socket.split();

    if let Err(err) = send_event(&mut sender, &session.greeting()).await {
        error!(%user_id, %err, "failed to send greeting");
        return;
    }

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = session.handle_text(text.as_str()).await {
                            if let Err(err) = send_event(&mut sender, &reply).await {
                                warn!(%user_id, %err, "failed to send reply");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%user_id, "client closed connection");
                        break;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(%user_id, len = data.len(), "binary frame rejected");
                        let reply = OutboundEvent::error("Invalid JSON format");
                        if let Err(err) = send_event(&mut sender, &reply).await {
                            warn!(%user_id, %err, "failed to send reply");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Err(err)) => {
                        warn!(%user_id, %err, "websocket receive error");
                        break;
                    }
                }
            }
            event = session.next_event() => {
                let Some(event) = event else {
                    info!(%user_id, "event hub closed");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if let Err(err) = send_event(&mut sender, &event).await {
                    warn!(%user_id, %err, "failed to forward event");
                    break;
                }
            }
        }
    }

    info!(%user_id, "websocket disconnected");
}

/// Serialize an event and send it as a text frame.
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &OutboundEvent,
) -> std::result::Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
