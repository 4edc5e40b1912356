//! Chess rules: board, pieces, move generation and the rules engine.

pub mod board;
pub mod game;
pub mod movegen;
pub mod notation;
pub mod types;

pub use board::Board;
pub use game::{ChessGame, Outcome};
pub use types::{Color, Move, Piece, PieceType, Position};
