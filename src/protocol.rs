//! Wire types for the client-facing socket. Incoming frames are tagged by
//! `type` with the variant's fields flattened alongside it; outgoing frames
//! are `{"messageType": ..., "data": ...}`. Mirrors `messages.py` /
//! `containers.py` in shape, replacing their hand-rolled dict validation with
//! serde's derive.

use serde::{Deserialize, Serialize};

use crate::chat::ChatThread;
use crate::rules::{ActionType, Color, Game, GameResult, Request};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    NewGame {
        vs: Vs,
        color: Color,
        size: usize,
        komi: f64,
    },
    JoinGame {
        key: String,
        ai_secret: Option<String>,
    },
    GameAction {
        key: String,
        action_type: ActionType,
        coords: Option<(usize, usize)>,
    },
    ChatMessage {
        key: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vs {
    Human,
    Computer,
}

/// The two keys minted for a new game. Serialized form always omits
/// `ai_secret` — it is never sent across the client boundary.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub white: String,
    pub black: String,
    pub white_ai_secret: Option<String>,
    pub black_ai_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeysWire {
    pub white: String,
    pub black: String,
}

impl From<&KeyPair> for KeysWire {
    fn from(kp: &KeyPair) -> Self {
        KeysWire {
            white: kp.white.clone(),
            black: kp.black.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "messageType", content = "data", rename_all = "snake_case")]
pub enum OutgoingMessage {
    NewGameResponse(GameOpenedResponse),
    JoinGameResponse(GameOpenedResponse),
    GameActionResponse(ActionResponse),
    GameStatus(GameStatusPayload),
    Chat(ChatThread),
    OpponentConnected { #[serde(rename = "opponentConnected")] opponent_connected: bool },
    Error { #[serde(rename = "errorMessage")] error_message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GameOpenedResponse {
    pub success: bool,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeysWire>,
    #[serde(rename = "yourColor", skip_serializing_if = "Option::is_none")]
    pub your_color: Option<Color>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStatusPayload {
    pub board: crate::rules::Board,
    pub status: crate::rules::GameStatus,
    pub komi: f64,
    pub prisoners: crate::rules::ByColor<u32>,
    pub turn: Color,
    pub territory: crate::rules::ByColor<u32>,
    #[serde(rename = "pendingRequest")]
    pub pending_request: Option<Request>,
    pub result: Option<GameResult>,
    #[serde(rename = "lastMove")]
    pub last_move: Option<(usize, usize)>,
    #[serde(rename = "timePlayed")]
    pub time_played: f64,
}

impl GameStatusPayload {
    pub fn new(game: &Game, time_played: f64) -> Self {
        GameStatusPayload {
            board: game.board.clone(),
            status: game.status,
            komi: game.komi,
            prisoners: game.prisoners,
            turn: game.turn,
            territory: game.territory,
            pending_request: game.pending_request,
            result: game.result,
            last_move: game.last_move,
            time_played,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_frame_parses_required_fields() {
        let raw = r#"{"type":"new_game","vs":"human","color":"black","size":19,"komi":6.5}"#;
        let msg: IncomingMessage = serde_json::from_str(raw).unwrap();
        match msg {
            IncomingMessage::NewGame { vs, color, size, komi } => {
                assert_eq!(vs, Vs::Human);
                assert_eq!(color, Color::Black);
                assert_eq!(size, 19);
                assert_eq!(komi, 6.5);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn new_game_frame_missing_field_errors() {
        let raw = r#"{"type":"new_game","vs":"human","color":"black","size":19}"#;
        assert!(serde_json::from_str::<IncomingMessage>(raw).is_err());
    }

    #[test]
    fn join_game_frame_ai_secret_is_optional() {
        let raw = r#"{"type":"join_game","key":"abcdefghij"}"#;
        let msg: IncomingMessage = serde_json::from_str(raw).unwrap();
        match msg {
            IncomingMessage::JoinGame { key, ai_secret } => {
                assert_eq!(key, "abcdefghij");
                assert!(ai_secret.is_none());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn keys_wire_omits_ai_secret() {
        let kp = KeyPair {
            white: "w".repeat(10),
            black: "b".repeat(10),
            white_ai_secret: Some("secret".into()),
            black_ai_secret: None,
        };
        let wire = KeysWire::from(&kp);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["white"], "w".repeat(10));
        assert!(json.get("ai_secret").is_none());
        assert!(json.get("white_ai_secret").is_none());
    }

    #[test]
    fn outgoing_game_status_matches_wire_shape() {
        let game = Game::new(9, 6.5);
        let payload = GameStatusPayload::new(&game, 0.0);
        let msg = OutgoingMessage::GameStatus(payload);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messageType"], "game_status");
        assert_eq!(json["data"]["turn"], "black");
        assert_eq!(json["data"]["timePlayed"], 0.0);
    }

    #[test]
    fn opponent_connected_matches_wire_shape() {
        let msg = OutgoingMessage::OpponentConnected { opponent_connected: true };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messageType"], "opponent_connected");
        assert_eq!(json["data"]["opponentConnected"], true);
    }
}
