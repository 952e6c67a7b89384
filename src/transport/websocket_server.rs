use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{debug, error, info, warn};

use super::{IncomingMessage, LinkReply, OutgoingMessage};
use crate::{
    common::ReplyChannel,
    orchestrator::CommandContext,
    server::AppState,
};

pub const COMMANDS_PATH: &str = "/v1/commands";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(COMMANDS_PATH, get(websocket_handler))
        .with_state(state)
}

pub async fn websocket_handler(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, &'static str)> {
    let auth_header = headers.get("authorization").and_then(|h| h.to_str().ok());
    match auth_header {
        Some(auth) if auth == state.config.server.password => {}
        Some(_) => {
            warn!("Authorization failed: Invalid password provided");
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
        None => {
            warn!("Authorization failed: Missing Authorization header");
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
    }

    match headers.get("client-name").and_then(|h| h.to_str().ok()) {
        Some(name) => info!("Incoming connection from client: {}", name),
        None => warn!("Client connected without 'Client-Name' header"),
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

pub async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (token, outbox) = state.link.attach();
    info!("Bot client linked: connection={}", token);

    if let Ok(json) = serde_json::to_string(&OutgoingMessage::Ready) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    loop {
        tokio::select! {
            outgoing = outbox.recv_async() => {
                // a newer client took over the link
                let Ok(outgoing) = outgoing else { break };
                let json = match serde_json::to_string(&outgoing) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Could not encode {outgoing:?}: {e}");
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(json.into())).await {
                    error!("Socket send error: connection={} err={}", token, e);
                    break;
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: connection={} err={}", token, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<IncomingMessage>(&text) {
                        Ok(incoming) => handle_incoming(incoming, &state),
                        Err(e) => warn!("Bad WS msg: connection={} err={}", token, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    if state.link.detach(token) {
        state.engines.client_lost();
        info!("Bot client disconnected: connection={}", token);
    } else {
        debug!("Superseded connection closed: connection={}", token);
    }
}

fn handle_incoming(incoming: IncomingMessage, state: &Arc<AppState>) {
    match incoming {
        IncomingMessage::Command {
            user_id,
            guild_id,
            reply_to,
            voice_channel_id,
            content,
        } => {
            let ctx = CommandContext {
                user_id,
                guild_id,
                voice_channel: voice_channel_id,
                reply: ReplyChannel::new(Arc::new(LinkReply::new(state.link.clone(), reply_to))),
            };
            let orchestrator = state.orchestrator.clone();
            tokio::spawn(async move { orchestrator.handle(ctx, content).await });
        }
        IncomingMessage::TrackFinished {
            guild_id,
            play_id,
            error,
        } => state.engines.track_finished(&guild_id, play_id, error),
        IncomingMessage::GuildAvailable {
            guild_id,
            voice_channel_ids,
        } => state.link.update_guild(guild_id, voice_channel_ids),
    }
}
