//! Leg transport
//!
//! Upgrades `/agent/{id}/websocket` and pumps frames between the socket and
//! the agent session. Inbound text frames go to `AgentSession::on_leg_message`;
//! everything the session queues for the leg is written by a separate task,
//! so a slow socket never blocks the session.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use super::protocol::ErrorBody;
use super::routes::ApiError;
use super::AppState;
use crate::error::Error;
use crate::session::{is_valid_agent_id, AgentSession, LegCommand, SessionRegistry};

/// How long a finished leg waits for queued frames to flush
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) async fn ws_handler(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_valid_agent_id(&agent_id) {
        return ApiError::from(Error::InvalidAgentId(agent_id)).into_response();
    }
    let session = match state.registry.resolve(&agent_id).await {
        Ok(session) => session,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(agent_id = %agent_id, reason = %rejection, "Not a WebSocket upgrade");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("Expected WebSocket connection")),
            )
                .into_response();
        }
    };

    let registry = state.registry.clone();
    let idle_timeout = state.leg_idle_timeout;
    ws.on_upgrade(move |socket| drive_leg(socket, session, registry, idle_timeout))
}

enum LegEvent {
    Frame(Message),
    Ended,
    Failed(axum::Error),
    IdleTimeout,
}

async fn next_event(
    receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> LegEvent {
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
            Ok(next) => next,
            Err(_) => return LegEvent::IdleTimeout,
        },
        None => receiver.next().await,
    };
    match next {
        Some(Ok(message)) => LegEvent::Frame(message),
        Some(Err(e)) => LegEvent::Failed(e),
        None => LegEvent::Ended,
    }
}

async fn drive_leg(
    socket: WebSocket,
    session: Arc<AgentSession>,
    registry: SessionRegistry,
    idle_timeout: Option<Duration>,
) {
    let (leg_id, mut outbound) = registry.open_leg(&session).await;
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(command) = outbound.recv().await {
            match command {
                LegCommand::Text(text) => {
                    if sender.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                LegCommand::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut writer_done = false;
    loop {
        let event = tokio::select! {
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            event = next_event(&mut receiver, idle_timeout) => event,
        };

        match event {
            LegEvent::Frame(Message::Text(text)) => {
                registry.touch(session.id()).await;
                session.on_leg_message(&leg_id, text.as_str());
            }
            LegEvent::Frame(Message::Binary(_)) => {
                session.reply_error(&leg_id, "Binary frames are not supported");
            }
            LegEvent::Frame(Message::Close(_)) | LegEvent::Ended => break,
            // transport-level ping/pong is answered by the socket itself
            LegEvent::Frame(_) => {}
            LegEvent::Failed(e) => {
                session.on_leg_error(&leg_id, &e.to_string());
                break;
            }
            LegEvent::IdleTimeout => {
                info!(agent_id = %session.id(), leg_id = %leg_id, "Leg idle, disconnecting");
                session.disconnect_leg(&leg_id);
                break;
            }
        }
    }

    registry.close_leg(&session, &leg_id).await;
    if !writer_done && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
}
