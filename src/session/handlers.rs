//! Translation of each `IncomingMessage` variant into Store Gateway calls and
//! `OutgoingMessage` replies, per spec.md §4.2. Grounded in
//! `game_manager.py`'s `route_message` dispatch and its `new_game`/
//! `join_game` handlers.

use crate::ai_launcher::AiLauncher;
use crate::protocol::{ActionResponse, GameOpenedResponse, GameStatusPayload, IncomingMessage, KeysWire, OutgoingMessage, Vs};
use crate::rules::{Action, ActionType, Color, Game};
use crate::session::{ClientSession, EventSender, SessionManager};
use crate::store::JoinResult;

pub async fn handle(
    manager: &SessionManager,
    ai_launcher: &AiLauncher,
    event_sender: &EventSender,
    session: &mut Option<ClientSession>,
    msg: IncomingMessage,
) -> Vec<OutgoingMessage> {
    match msg {
        IncomingMessage::NewGame { vs, color, size, komi } => {
            new_game(manager, ai_launcher, event_sender, session, vs, color, size, komi).await
        }
        IncomingMessage::JoinGame { key, ai_secret } => {
            join_game(manager, ai_launcher, event_sender, session, key, ai_secret).await
        }
        IncomingMessage::GameAction { key, action_type, coords } => {
            game_action(manager, session, key, action_type, coords).await
        }
        IncomingMessage::ChatMessage { key, message } => chat_message(manager, session, key, message).await,
    }
}

async fn new_game(
    manager: &SessionManager,
    ai_launcher: &AiLauncher,
    event_sender: &EventSender,
    session: &mut Option<ClientSession>,
    vs: Vs,
    color: Color,
    size: usize,
    komi: f64,
) -> Vec<OutgoingMessage> {
    let old_key = session.as_ref().map(|s| s.key.clone());
    let game = Game::new(size, komi);
    let ai_colors: Vec<Color> = if vs == Vs::Computer { vec![color.inverse()] } else { Vec::new() };

    let keys = match manager
        .store()
        .write_new_game(&game, Some(color), &ai_colors, old_key.as_deref())
        .await
    {
        Ok(keys) => keys,
        Err(e) => return vec![error_frame(format!("failed to create game: {e}"))],
    };

    if let Some(old) = &old_key {
        manager.unregister(old).await;
    }

    let own_key = match color {
        Color::White => keys.white.clone(),
        Color::Black => keys.black.clone(),
    };
    manager.register(own_key.clone(), event_sender.clone()).await;

    let explanation = match vs {
        Vs::Computer => "New game created against the computer.".to_string(),
        Vs::Human => {
            let opponent_key = match color {
                Color::White => &keys.black,
                Color::Black => &keys.white,
            };
            format!("New game created. Share key {opponent_key} with your opponent.")
        }
    };

    if vs == Vs::Computer {
        let (opponent_key, opponent_secret) = match color {
            Color::White => (keys.black.clone(), keys.black_ai_secret.clone()),
            Color::Black => (keys.white.clone(), keys.white_ai_secret.clone()),
        };
        if let Some(secret) = opponent_secret {
            let launcher = ai_launcher.clone();
            tokio::spawn(async move { launcher.start(&opponent_key, &secret, false).await });
        }
    }

    *session = Some(ClientSession::new(own_key, color, game.clone(), 0.0));

    vec![
        OutgoingMessage::NewGameResponse(GameOpenedResponse {
            success: true,
            explanation,
            keys: Some(KeysWire::from(&keys)),
            your_color: Some(color),
        }),
        OutgoingMessage::GameStatus(GameStatusPayload::new(&game, 0.0)),
        OutgoingMessage::Chat(crate::chat::ChatThread::empty_complete()),
        OutgoingMessage::OpponentConnected { opponent_connected: false },
    ]
}

async fn join_game(
    manager: &SessionManager,
    ai_launcher: &AiLauncher,
    event_sender: &EventSender,
    session: &mut Option<ClientSession>,
    key: String,
    ai_secret: Option<String>,
) -> Vec<OutgoingMessage> {
    if let Some(existing) = session.as_ref() {
        if existing.key == key {
            return vec![join_failure("already playing")];
        }
    }

    let old_key = session.as_ref().map(|s| s.key.clone());
    let outcome = match manager
        .store()
        .join_game(&key, old_key.as_deref(), ai_secret.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return vec![error_frame(format!("failed to join game: {e}"))],
    };

    let (white_key, black_key, opponent_ai_secret) = match outcome {
        JoinResult::Dne => return vec![join_failure("not found")],
        JoinResult::InUse => return vec![join_failure("someone else is already playing")],
        JoinResult::AiOnly => return vec![join_failure("designated computer player")],
        JoinResult::Success { white_key, black_key, opponent_ai_secret } => {
            (white_key, black_key, opponent_ai_secret)
        }
    };

    if let Some(old) = &old_key {
        manager.unregister(old).await;
    }
    manager.register(key.clone(), event_sender.clone()).await;

    let your_color = if key == white_key { Color::White } else { Color::Black };
    let opponent_key = if your_color == Color::White { black_key.clone() } else { white_key.clone() };

    let (game, time_played) = match manager.store().read_game_status(&key).await {
        Ok(Some((game, time_played, _version))) => (game, time_played),
        _ => (Game::new(9, 6.5), 0.0),
    };
    *session = Some(ClientSession::new(key.clone(), your_color, game, time_played));

    if let Err(e) = manager.store().trigger_update_all(&key).await {
        tracing::error!(error = %e, key, "trigger_update_all failed after join");
    }

    if let Some(secret) = opponent_ai_secret {
        let launcher = ai_launcher.clone();
        tokio::spawn(async move { launcher.start(&opponent_key, &secret, false).await });
    }

    vec![OutgoingMessage::JoinGameResponse(GameOpenedResponse {
        success: true,
        explanation: "joined".into(),
        keys: Some(KeysWire { white: white_key, black: black_key }),
        your_color: Some(your_color),
    })]
}

async fn game_action(
    manager: &SessionManager,
    session: &mut Option<ClientSession>,
    key: String,
    action_type: ActionType,
    coords: Option<(usize, usize)>,
) -> Vec<OutgoingMessage> {
    let Some(sess) = session.as_mut() else {
        return vec![error_frame("no active session".into())];
    };
    if sess.key != key {
        tracing::warn!(
            session_key = %sess.key,
            message_key = %key,
            "game_action referenced a key not owned by this socket"
        );
        return Vec::new();
    }

    let action = Action {
        action_type,
        color: sess.color,
        timestamp: now_seconds(),
        coords,
    };

    let mut candidate = sess.game.clone();
    let (accepted, explanation) = candidate.take_action(action);
    if !accepted {
        return vec![OutgoingMessage::GameActionResponse(ActionResponse { success: false, explanation })];
    }

    match manager.store().write_game(&key, &candidate, candidate.version()).await {
        Ok(Some(time_played)) => {
            sess.game = candidate;
            sess.time_played = time_played;
            vec![
                OutgoingMessage::GameActionResponse(ActionResponse { success: true, explanation }),
                OutgoingMessage::GameStatus(GameStatusPayload::new(&sess.game, sess.time_played)),
            ]
        }
        Ok(None) => vec![OutgoingMessage::GameActionResponse(ActionResponse {
            success: false,
            explanation: "preempted".into(),
        })],
        Err(e) => vec![error_frame(format!("failed to write game: {e}"))],
    }
}

async fn chat_message(
    manager: &SessionManager,
    session: &mut Option<ClientSession>,
    key: String,
    message: String,
) -> Vec<OutgoingMessage> {
    let Some(sess) = session.as_ref() else {
        return vec![error_frame("no active session".into())];
    };
    if sess.key != key {
        tracing::warn!(
            session_key = %sess.key,
            message_key = %key,
            "chat_message referenced a key not owned by this socket"
        );
        return Vec::new();
    }

    if let Err(e) = manager.store().write_chat(&key, now_seconds(), &message).await {
        return vec![error_frame(format!("failed to write chat: {e}"))];
    }
    Vec::new()
}

fn error_frame(message: String) -> OutgoingMessage {
    OutgoingMessage::Error { error_message: message }
}

fn join_failure(explanation: &str) -> OutgoingMessage {
    OutgoingMessage::JoinGameResponse(GameOpenedResponse {
        success: false,
        explanation: explanation.to_string(),
        keys: None,
        your_color: None,
    })
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
