//! Axum websocket upgrade handler and per-connection task. Adapted from the
//! teacher's `socket.rs::ws_handler`/`handle_socket`, with the client message
//! enum and broadcast bookkeeping replaced by `protocol::IncomingMessage` /
//! `session::handlers::handle` and the `SessionEvent` dispatch described in
//! `session/mod.rs`. Origin checking and the ping cadence are ported from
//! `connection_manager.py`'s `check_origin`/`websocket_ping_interval`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::ai_launcher::AiLauncher;
use crate::protocol::{GameStatusPayload, IncomingMessage, OutgoingMessage};
use crate::session::{handlers, ClientSession, SessionEvent, SessionManager};

/// Tornado's default `websocket_ping_timeout` is `max(3 * ping_interval, 30)`
/// seconds; at a 10s ping interval that's 30s, matching spec.md §5.
const PING_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub ai_launcher: AiLauncher,
    pub origin_suffix: Arc<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !origin_allowed(origin, &state.origin_suffix) {
        tracing::warn!(origin, "disallowed origin attempted to connect");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// A leading `^` anchors to an exact host match (port stripped); otherwise
/// the host must end with the configured suffix. An empty suffix allows
/// every origin. Mirrors the `match_expr` built in `check_origin`.
fn origin_allowed(origin: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return true;
    }

    let without_scheme = origin.split("://").nth(1).unwrap_or(origin);
    let host_and_port = without_scheme.split('/').next().unwrap_or(without_scheme);
    let host = host_and_port.rsplit_once(':').map(|(h, _)| h).unwrap_or(host_and_port);

    match suffix.strip_prefix('^') {
        Some(exact) => host == exact,
        None => host.ends_with(suffix),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut outbound, mut inbound) = socket.split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut session: Option<ClientSession> = None;
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            frame = inbound.next() => {
                let Some(frame) = frame else { break };
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<IncomingMessage>(&text) {
                            Ok(msg) => {
                                let replies = handlers::handle(
                                    &state.sessions,
                                    &state.ai_launcher,
                                    &event_tx,
                                    &mut session,
                                    msg,
                                )
                                .await;
                                for reply in replies {
                                    if send_frame(&mut outbound, &reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                let _ = send_frame(
                                    &mut outbound,
                                    &OutgoingMessage::Error { error_message: format!("malformed frame: {e}") },
                                )
                                .await;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { continue };
                if let Some(reply) = apply_event(&mut session, event) {
                    if send_frame(&mut outbound, &reply).await.is_err() {
                        break;
                    }
                }
            }
            _ = ping_interval.tick() => {
                if outbound.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(sess) = session.take() {
        state.sessions.unregister(&sess.key).await;
        state.sessions.store().unsubscribe(&sess.key).await;
    }
}

/// Applies a dispatched notification to the socket's own cached
/// `ClientSession` and renders the corresponding outgoing frame. This is
/// the one place session state is mutated from outside the socket's own
/// message-handling path, and it only ever runs on this socket's task, so
/// exclusive ownership of `ClientSession` is preserved.
fn apply_event(session: &mut Option<ClientSession>, event: SessionEvent) -> Option<OutgoingMessage> {
    let sess = session.as_mut()?;
    match event {
        SessionEvent::GameStatus { key, game, time_played } => {
            if sess.key != key {
                return None;
            }
            sess.game = game;
            sess.time_played = time_played;
            Some(OutgoingMessage::GameStatus(GameStatusPayload::new(&sess.game, sess.time_played)))
        }
        SessionEvent::Chat { key, thread } => {
            if sess.key != key {
                return None;
            }
            sess.chat_thread.merge(thread);
            Some(OutgoingMessage::Chat(sess.chat_thread.clone()))
        }
        SessionEvent::OpponentConnected { key, connected } => {
            if sess.key != key {
                return None;
            }
            sess.opponent_connected = connected;
            Some(OutgoingMessage::OpponentConnected { opponent_connected: connected })
        }
    }
}

async fn send_frame(
    outbound: &mut SplitSink<WebSocket, Message>,
    msg: &OutgoingMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).expect("OutgoingMessage always serializes");
    outbound.send(Message::Text(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_suffix_allows_everything() {
        assert!(origin_allowed("https://anything.example.com", ""));
    }

    #[test]
    fn suffix_requires_matching_tail() {
        assert!(origin_allowed("https://play.mydomain.com", ".mydomain.com"));
        assert!(!origin_allowed("https://play.otherdomain.com", ".mydomain.com"));
    }

    #[test]
    fn caret_anchors_to_exact_host() {
        assert!(origin_allowed("https://mydomain.com", "^mydomain.com"));
        assert!(!origin_allowed("https://play.mydomain.com", "^mydomain.com"));
    }

    #[test]
    fn port_is_ignored() {
        assert!(origin_allowed("https://mydomain.com:8080", "^mydomain.com"));
    }
}
