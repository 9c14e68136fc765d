//! WebSocket upgrade handler and per-connection session loop

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::relay::MemberProfile;
use crate::util::names::sanitize_display_name;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler. No authentication: the relay trusts every
/// connection and assigns it a fresh player id at handshake.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Per-connection outbound channel; the owning room holds the sender
    // side once the player joins
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(256);

    // Writer task: outbound channel -> WebSocket
    let writer_player_id = player_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    run_session(player_id, &state, out_tx, ws_stream).await;

    writer_handle.abort();
    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> room mailbox
async fn run_session(
    player_id: Uuid,
    state: &AppState,
    out_tx: mpsc::Sender<ServerMsg>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    let mut room_id: Option<Uuid> = None;

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_relay() {
                    warn!(player_id = %player_id, "Rate limited client message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        // Malformed payloads are logged and dropped; the
                        // connection stays open
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                match client_msg {
                    ClientMsg::Ping { t } => {
                        let _ = out_tx.send(ServerMsg::Pong { t }).await;
                    }

                    ClientMsg::Join {
                        name,
                        cosmetic_ref,
                        x,
                        y,
                    } => {
                        if room_id.is_some() {
                            let _ = out_tx
                                .send(ServerMsg::Error {
                                    code: "already_in_room".to_string(),
                                    message: "Leave the current room before joining".to_string(),
                                })
                                .await;
                            continue;
                        }

                        let fallback = format!("Player_{}", &player_id.to_string()[..8]);
                        let profile = MemberProfile {
                            display_name: sanitize_display_name(&name, &fallback),
                            cosmetic_ref,
                            x,
                            y,
                        };

                        match state.rooms.join(player_id, profile, out_tx.clone()).await {
                            Ok(assignment) => {
                                room_id = Some(assignment.room_id);
                                let _ = out_tx
                                    .send(ServerMsg::Init {
                                        player_id,
                                        room_id: assignment.room_id,
                                        server_time: unix_millis(),
                                        time_left_ms: assignment.time_left_ms,
                                        members: assignment.members,
                                    })
                                    .await;
                            }
                            Err(e) => {
                                error!(player_id = %player_id, error = %e, "Join failed");
                                let _ = out_tx
                                    .send(ServerMsg::Error {
                                        code: "join_failed".to_string(),
                                        message: e.to_string(),
                                    })
                                    .await;
                            }
                        }
                    }

                    ClientMsg::Leave => {
                        if let Some(rid) = room_id.take() {
                            state.rooms.leave(rid, player_id).await;
                        }
                    }

                    // Relay payloads go to the room untouched
                    relayed @ (ClientMsg::Position { .. }
                    | ClientMsg::Shot { .. }
                    | ClientMsg::Death { .. }) => match room_id {
                        Some(rid) => state.rooms.relay(rid, player_id, relayed).await,
                        None => {
                            debug!(player_id = %player_id, "Relay message before join, ignoring")
                        }
                    },
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Disconnect cancels relay interest; the match carries on without us
    if let Some(rid) = room_id {
        state.rooms.leave(rid, player_id).await;
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
