//! WebSocket endpoint for the session gateway.
//!
//! Each socket gets a connection id, an unbounded outbound channel and a
//! dedicated send task; the receive loop parses [`ClientCommand`] frames and
//! drives the session registry. A connection belongs to at most one session
//! at a time.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::kernel::sessions::{ClientCommand, ConnectionSender, ServerMessage};
use crate::server::app::AppState;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    debug!(conn_id = %conn_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<Uuid> = None;

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            frame = stream.next() => {
                let Some(Ok(frame)) = frame else { break };
                match frame {
                    Message::Text(raw) => {
                        let command = match ClientCommand::parse(&raw) {
                            Ok(command) => command,
                            Err(e) => {
                                warn!(conn_id = %conn_id, error = %e, "bad command");
                                let _ = tx.send(ServerMessage::Error {
                                    message: e.to_string(),
                                });
                                continue;
                            }
                        };
                        if let Some(reply) =
                            handle_command(&state, conn_id, &tx, &mut session, command).await
                        {
                            let _ = tx.send(reply);
                        }
                    }
                    Message::Close(_) => break,
                    // Pings are answered by axum; binary frames are ignored
                    _ => {}
                }
            }
        }
    }

    if let Some(session_id) = session {
        state.sessions.detach(session_id, conn_id).await;
    }
    send_task.abort();
    debug!(conn_id = %conn_id, "websocket disconnected");
}

/// Apply one client command against the connection's active session.
/// Returns the direct reply, if any; fan-out messages go through the
/// registry instead.
pub async fn handle_command(
    state: &AppState,
    conn_id: Uuid,
    sender: &ConnectionSender,
    session: &mut Option<Uuid>,
    command: ClientCommand,
) -> Option<ServerMessage> {
    match command {
        ClientCommand::CreateSession => {
            let session_id = state.sessions.create_session(conn_id, sender.clone()).await;
            *session = Some(session_id);
            Some(ServerMessage::SessionCreated { session_id })
        }

        ClientCommand::JoinSession { session_id } => {
            // Unknown ids start an empty session; re-joins are idempotent
            state.sessions.join(session_id, conn_id, sender.clone()).await;
            *session = Some(session_id);

            let jobs = match state.gateway.snapshot(session_id).await {
                Ok(jobs) => jobs.unwrap_or_default(),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "snapshot failed");
                    return Some(error_reply("failed to load session".to_string()));
                }
            };
            // session_joined first, then the full snapshot
            let _ = sender.send(ServerMessage::SessionJoined { session_id });
            Some(ServerMessage::SessionUpdate { session_id, jobs })
        }

        ClientCommand::AddJob { job_id } => {
            let Some(session_id) = *session else {
                return Some(no_active_session());
            };
            state.sessions.add_job(session_id, job_id).await;
            // Everyone in the session sees the new tracked set immediately
            if let Err(e) = state.gateway.push_snapshot(session_id).await {
                warn!(session_id = %session_id, error = %e, "snapshot push failed");
            }
            None
        }

        ClientCommand::CancelJob { job_id } => {
            if session.is_none() {
                return Some(no_active_session());
            }
            // Best-effort; terminal and unknown jobs are a no-op
            state.worker.cancel(job_id).await;
            None
        }

        ClientCommand::ClearSession => {
            let Some(session_id) = *session else {
                return Some(no_active_session());
            };
            state.sessions.clear_jobs(session_id).await;
            if let Err(e) = state.gateway.push_snapshot(session_id).await {
                warn!(session_id = %session_id, error = %e, "snapshot push failed");
            }
            None
        }
    }
}

fn no_active_session() -> ServerMessage {
    error_reply(crate::kernel::sessions::ProtocolError::NoActiveSession.to_string())
}

fn error_reply(message: String) -> ServerMessage {
    ServerMessage::Error { message }
}
