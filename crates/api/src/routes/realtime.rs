use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::{http::HeaderMap, response::Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tripmate_domain::realtime::{ClientEvent, ServerEvent, SessionConnection, SessionManager};

use crate::{error::ApiError, middleware::handshake_token, observability, state::AppState};

const INVALID_EVENT_MESSAGE: &str = "Invalid event payload";

#[derive(Debug, Deserialize)]
pub(super) struct HandshakeQuery {
    token: Option<String>,
}

/// Authenticates before the protocol switch so a bad credential is a plain 401.
pub(super) async fn upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HandshakeQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = handshake_token(&headers, query.token.as_deref());
    let identity = match state.sessions.authenticate(token).await {
        Ok(identity) => identity,
        Err(err) => {
            observability::register_realtime_handshake("rejected");
            return Err(err.into());
        }
    };
    observability::register_realtime_handshake("accepted");

    let sessions = state.sessions.clone();
    let heartbeat = state.config.heartbeat_interval();
    Ok(ws.on_upgrade(move |socket| async move {
        let connection = sessions.open_session(identity).await;
        observability::set_realtime_sessions(sessions.session_count().await);
        let session_id = connection.session_id;

        run_session(socket, &sessions, connection, heartbeat).await;

        sessions.disconnect(session_id).await;
        observability::set_realtime_sessions(sessions.session_count().await);
    }))
}

async fn run_session(
    socket: WebSocket,
    sessions: &SessionManager,
    connection: SessionConnection,
    heartbeat: Option<Duration>,
) {
    let SessionConnection {
        session_id,
        identity,
        mut events,
    } = connection;
    let (mut sender, mut incoming) = socket.split();
    let mut heartbeat = heartbeat.map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return;
                };
                observability::register_realtime_event("outbound", event.name());
                let Some(payload) = encode(&event) else {
                    continue;
                };
                if sender.send(Message::Text(payload)).await.is_err() {
                    return;
                }
            }
            frame = incoming.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            observability::register_realtime_event("inbound", event.name());
                            sessions.handle(session_id, event).await;
                        }
                        Err(err) => {
                            tracing::debug!(
                                session_id,
                                user_id = %identity.user_id,
                                error = %err,
                                "malformed realtime frame"
                            );
                            observability::register_realtime_event("inbound", "invalid");
                            sessions.report_error(session_id, INVALID_EVENT_MESSAGE).await;
                        }
                    },
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
            _ = tick(&mut heartbeat) => {
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::error!(error = %err, event = event.name(), "failed to encode server event");
            None
        }
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
