//! The go rule engine. Out of the core's scope per the system design (it is
//! treated as an external collaborator, specified only at its interface) but
//! implemented here so the session layer has something real to drive.

mod board;
mod color;
mod game;

pub use board::{Board, Point};
pub use color::Color;
pub use game::{
    Action, ActionRecord, ActionType, ByColor, Game, GameResult, GameStatus, Request,
    RequestType, ResultType,
};
