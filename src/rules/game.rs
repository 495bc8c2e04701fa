use serde::{Deserialize, Serialize};

use super::board::Board;
use super::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PlaceStone,
    PassTurn,
    MarkDead,
    RequestDraw,
    Resign,
    RequestTallyScore,
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Play,
    Endgame,
    Complete,
    RequestPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    MarkDead,
    Draw,
    TallyScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    StandardWin,
    Draw,
    Resignation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "requestType")]
    pub request_type: RequestType,
    pub initiator: Color,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameResult {
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    pub winner: Option<Color>,
}

/// A single accepted or attempted move.
#[derive(Debug, Clone, Copy)]
pub struct Action {
    pub action_type: ActionType,
    pub color: Color,
    pub timestamp: f64,
    pub coords: Option<(usize, usize)>,
}

/// Per-color tally, used for prisoners and territory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ByColor<T> {
    pub white: T,
    pub black: T,
}

impl<T: Copy> ByColor<T> {
    pub fn get(&self, color: Color) -> T {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn set(&mut self, color: Color, value: T) {
        match color {
            Color::White => self.white = value,
            Color::Black => self.black = value,
        }
    }
}

/// The full state and rule logic of a go game. `version()` (the length of
/// `action_stack`) is the optimistic-concurrency token the store gateway
/// checks on every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub status: GameStatus,
    pub turn: Color,
    pub action_stack: Vec<ActionRecord>,
    pub board: Board,
    pub komi: f64,
    pub prisoners: ByColor<u32>,
    pub territory: ByColor<u32>,
    #[serde(rename = "pendingRequest")]
    pub pending_request: Option<Request>,
    pub result: Option<GameResult>,
    #[serde(rename = "lastMove")]
    pub last_move: Option<(usize, usize)>,
    #[serde(skip)]
    prev_board: Option<Board>,
    #[serde(skip)]
    status_before_request: Option<GameStatus>,
}

/// Wire/storage record of an action. Kept separate from `Action` so that
/// `Game` can be stored and round-tripped without holding a `WebSocketHandler`
/// or similar transient reference (there isn't one here, but the separation
/// mirrors how the original action stack is a pure data log).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: ActionType,
    pub color: Color,
    pub timestamp: f64,
    pub coords: Option<(usize, usize)>,
}

impl From<Action> for ActionRecord {
    fn from(a: Action) -> Self {
        ActionRecord {
            action_type: a.action_type,
            color: a.color,
            timestamp: a.timestamp,
            coords: a.coords,
        }
    }
}

impl Game {
    pub fn new(size: usize, komi: f64) -> Self {
        Game {
            status: GameStatus::Play,
            turn: Color::Black,
            action_stack: Vec::new(),
            board: Board::new(size),
            komi,
            prisoners: ByColor { white: 0, black: 0 },
            territory: ByColor { white: 0, black: 0 },
            pending_request: None,
            result: None,
            last_move: None,
            prev_board: None,
            status_before_request: None,
        }
    }

    /// Equal to `action_stack.len()`; the basis of optimistic concurrency.
    pub fn version(&self) -> i64 {
        self.action_stack.len() as i64
    }

    /// Attempt to take `action`. Returns `(accepted, explanation)`. On
    /// rejection, no field of `self` is mutated.
    pub fn take_action(&mut self, action: Action) -> (bool, String) {
        if let Some(prev) = self.action_stack.last() {
            if action.timestamp < prev.timestamp {
                return (false, "Action timestamp precedes the last accepted action".into());
            }
        }

        let (ok, msg) = match action.action_type {
            ActionType::PlaceStone => self.place_stone(action),
            ActionType::PassTurn => self.pass_turn(action),
            ActionType::MarkDead => self.mark_dead(action),
            ActionType::RequestDraw => self.request(action, RequestType::Draw),
            ActionType::RequestTallyScore => self.request(action, RequestType::TallyScore),
            ActionType::Resign => self.resign(action),
            ActionType::Accept => self.accept(action),
            ActionType::Reject => self.reject(action),
        };

        if ok {
            self.action_stack.push(action.into());
        }
        (ok, msg)
    }

    fn place_stone(&mut self, action: Action) -> (bool, String) {
        if self.status != GameStatus::Play {
            return (false, "The game is not in a state that accepts moves".into());
        }
        if action.color != self.turn {
            return (false, format!("It isn't {}'s turn", action.color.to_short_name()));
        }
        let Some(coords) = action.coords else {
            return (false, "place_stone requires coords".into());
        };
        if !self.board.in_bounds(coords) {
            return (false, "Coordinates are off the board".into());
        }
        if self.board.get(coords).color.is_some() {
            return (false, "That point is already occupied".into());
        }

        let mut candidate = self.board.clone();
        candidate.get_mut(coords).color = Some(action.color);

        let opponent = action.color.inverse();
        let mut captured = 0u32;
        for n in candidate.neighbors(coords) {
            if candidate.get(n).color == Some(opponent) {
                let (group, has_liberty) = candidate.group_and_liberties(n);
                if !has_liberty {
                    for stone in &group {
                        candidate.get_mut(*stone).color = None;
                    }
                    captured += group.len() as u32;
                }
            }
        }

        let (_, has_liberty) = candidate.group_and_liberties(coords);
        if !has_liberty {
            return (false, "That move is suicide".into());
        }

        if let Some(ko) = &self.prev_board {
            if *ko == candidate {
                return (false, "That move violates the simple ko rule".into());
            }
        }

        self.prev_board = Some(self.board.clone());
        self.board = candidate;
        let mut prisoners = self.prisoners.get(action.color);
        prisoners += captured;
        self.prisoners.set(action.color, prisoners);
        self.turn = opponent;
        self.last_move = Some(coords);
        (true, "Stone placed".into())
    }

    fn pass_turn(&mut self, action: Action) -> (bool, String) {
        if self.status != GameStatus::Play {
            return (false, "The game is not in a state that accepts passes".into());
        }
        if action.color != self.turn {
            return (false, format!("It isn't {}'s turn", action.color.to_short_name()));
        }

        let consecutive = matches!(
            self.action_stack.last(),
            Some(prev) if prev.action_type == ActionType::PassTurn && prev.color != action.color
        );

        self.turn = action.color.inverse();
        if consecutive {
            self.status = GameStatus::Endgame;
        }
        (true, "Turn passed".into())
    }

    fn mark_dead(&mut self, action: Action) -> (bool, String) {
        if self.status != GameStatus::Endgame {
            return (false, "Stones may only be marked dead during scoring".into());
        }
        let Some(coords) = action.coords else {
            return (false, "mark_dead requires coords".into());
        };
        if !self.board.in_bounds(coords) {
            return (false, "Coordinates are off the board".into());
        }
        if self.board.get(coords).color.is_none() {
            return (false, "There is no stone at that point".into());
        }

        let (group, _) = self.board.group_and_liberties(coords);
        let now_dead = !self.board.get(coords).marked_dead;
        for stone in group {
            self.board.get_mut(stone).marked_dead = now_dead;
        }
        (true, "Marked dead stones updated".into())
    }

    fn request(&mut self, action: Action, request_type: RequestType) -> (bool, String) {
        if self.status == GameStatus::Complete {
            return (false, "The game is already complete".into());
        }
        if self.pending_request.is_some() {
            return (false, "A request is already pending".into());
        }
        self.status_before_request = Some(self.status);
        self.status = GameStatus::RequestPending;
        self.pending_request = Some(Request {
            request_type,
            initiator: action.color,
        });
        (true, "Request recorded".into())
    }

    fn resign(&mut self, action: Action) -> (bool, String) {
        if self.status == GameStatus::Complete {
            return (false, "The game is already complete".into());
        }
        self.status = GameStatus::Complete;
        self.pending_request = None;
        self.result = Some(GameResult {
            result_type: ResultType::Resignation,
            winner: Some(action.color.inverse()),
        });
        (true, "Resignation recorded".into())
    }

    fn accept(&mut self, action: Action) -> (bool, String) {
        let Some(request) = self.pending_request else {
            return (false, "There is no pending request".into());
        };
        if request.initiator == action.color {
            return (false, "You cannot accept your own request".into());
        }

        match request.request_type {
            RequestType::Draw => {
                self.status = GameStatus::Complete;
                self.result = Some(GameResult {
                    result_type: ResultType::Draw,
                    winner: None,
                });
            }
            RequestType::TallyScore => self.tally_score(),
            RequestType::MarkDead => {
                self.status = self.status_before_request.unwrap_or(GameStatus::Endgame);
            }
        }
        self.pending_request = None;
        self.status_before_request = None;
        (true, "Request accepted".into())
    }

    fn reject(&mut self, action: Action) -> (bool, String) {
        let Some(request) = self.pending_request else {
            return (false, "There is no pending request".into());
        };
        if request.initiator == action.color {
            return (false, "You cannot reject your own request".into());
        }
        self.status = self.status_before_request.unwrap_or(GameStatus::Play);
        self.status_before_request = None;
        self.pending_request = None;
        (true, "Request rejected".into())
    }

    fn tally_score(&mut self) {
        let mut territory = ByColor { white: 0u32, black: 0u32 };
        let mut visited = std::collections::HashSet::new();

        // dead-marked stones are removed from the board and their count
        // credited as prisoners to the opponent, as in Chinese-style scoring
        let dead_stones: Vec<_> = self
            .board
            .all_coords()
            .filter(|c| self.board.get(*c).marked_dead)
            .collect();
        for coords in dead_stones {
            if let Some(color) = self.board.get(coords).color {
                let mut prisoners = self.prisoners.get(color.inverse());
                prisoners += 1;
                self.prisoners.set(color.inverse(), prisoners);
                self.board.get_mut(coords).color = None;
            }
        }

        let is_empty = |p: &super::board::Point| p.color.is_none();
        let coords: Vec<_> = self.board.all_coords().collect();
        for coords in coords {
            if visited.contains(&coords) || !is_empty(self.board.get(coords)) {
                continue;
            }
            let (region, borders) = self.board.empty_region(coords, is_empty);
            if borders.len() == 1 {
                let color = *borders.iter().next().unwrap();
                territory.set(color, territory.get(color) + region.len() as u32);
                for p in &region {
                    self.board.get_mut(*p).counted = true;
                    self.board.get_mut(*p).counts_for = Some(color);
                }
            }
            visited.extend(region);
        }

        self.territory = territory;
        let white_score = self.territory.white as f64 + self.prisoners.white as f64 + self.komi;
        let black_score = self.territory.black as f64 + self.prisoners.black as f64;

        self.status = GameStatus::Complete;
        self.result = Some(GameResult {
            result_type: if white_score == black_score {
                ResultType::Draw
            } else {
                ResultType::StandardWin
            },
            winner: if white_score > black_score {
                Some(Color::White)
            } else if black_score > white_score {
                Some(Color::Black)
            } else {
                None
            },
        });
    }
}

impl Color {
    fn to_short_name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(action_type: ActionType, color: Color, t: f64, coords: Option<(usize, usize)>) -> Action {
        Action { action_type, color, timestamp: t, coords }
    }

    #[test]
    fn version_tracks_action_stack() {
        let mut g = Game::new(9, 6.5);
        assert_eq!(g.version(), 0);
        let (ok, _) = g.take_action(action(ActionType::PlaceStone, Color::Black, 1.0, Some((0, 0))));
        assert!(ok);
        assert_eq!(g.version(), 1);
    }

    #[test]
    fn turn_order_is_enforced() {
        let mut g = Game::new(9, 6.5);
        let (ok, msg) = g.take_action(action(ActionType::PlaceStone, Color::White, 1.0, Some((0, 0))));
        assert!(!ok);
        assert!(msg.contains("white"));
        assert_eq!(g.version(), 0);
    }

    #[test]
    fn occupied_point_is_rejected() {
        let mut g = Game::new(9, 6.5);
        g.take_action(action(ActionType::PlaceStone, Color::Black, 1.0, Some((0, 0))));
        let (ok, _) = g.take_action(action(ActionType::PlaceStone, Color::White, 2.0, Some((0, 0))));
        assert!(!ok);
    }

    #[test]
    fn capture_removes_surrounded_group() {
        let mut g = Game::new(9, 6.5);
        // black surrounds a single white stone at (1,1)
        let moves = [
            (Color::Black, (0, 1)),
            (Color::White, (1, 1)),
            (Color::Black, (1, 0)),
            (Color::White, (8, 8)), // filler move elsewhere
            (Color::Black, (1, 2)),
            (Color::White, (7, 7)),
            (Color::Black, (2, 1)),
        ];
        for (i, (color, coords)) in moves.iter().enumerate() {
            let (ok, msg) = g.take_action(action(ActionType::PlaceStone, *color, (i + 1) as f64, Some(*coords)));
            assert!(ok, "move {i} rejected: {msg}");
        }
        assert!(g.board.get((1, 1)).color.is_none());
        assert_eq!(g.prisoners.black, 1);
    }

    #[test]
    fn double_pass_enters_endgame() {
        let mut g = Game::new(9, 6.5);
        g.take_action(action(ActionType::PassTurn, Color::Black, 1.0, None));
        g.take_action(action(ActionType::PassTurn, Color::White, 2.0, None));
        assert_eq!(g.status, GameStatus::Endgame);
    }

    #[test]
    fn resign_ends_game_immediately() {
        let mut g = Game::new(9, 6.5);
        let (ok, _) = g.take_action(action(ActionType::Resign, Color::Black, 1.0, None));
        assert!(ok);
        assert_eq!(g.status, GameStatus::Complete);
        assert_eq!(g.result.unwrap().winner, Some(Color::White));
    }

    #[test]
    fn draw_request_requires_opponent_accept() {
        let mut g = Game::new(9, 6.5);
        g.take_action(action(ActionType::RequestDraw, Color::Black, 1.0, None));
        assert_eq!(g.status, GameStatus::RequestPending);
        let (ok, _) = g.take_action(action(ActionType::Accept, Color::Black, 2.0, None));
        assert!(!ok, "initiator cannot accept their own request");
        let (ok, _) = g.take_action(action(ActionType::Accept, Color::White, 3.0, None));
        assert!(ok);
        assert_eq!(g.status, GameStatus::Complete);
        assert_eq!(g.result.unwrap().result_type, ResultType::Draw);
    }

    #[test]
    fn game_round_trips_through_json() {
        let mut g = Game::new(9, 6.5);
        g.take_action(action(ActionType::PlaceStone, Color::Black, 1.0, Some((0, 0))));
        let json = serde_json::to_string(&g).unwrap();
        let back: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version(), g.version());
        assert_eq!(back.board, g.board);
    }
}
