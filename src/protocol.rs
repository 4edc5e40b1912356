//! Wire messages. Every message is one JSON object with a `type` discriminator.
//!
//! Inbound: `{"type":"MAKE_MOVE","authToken":"..","gameID":1,"move":{"startRow":2,...}}`.
//! Outbound: `LOAD_GAME` with the board, `NOTIFICATION` and `ERROR` with a message.

use serde::{Deserialize, Serialize};

use crate::chess::{Board, Move, PieceType, Position};
use crate::error::ServiceError;
use crate::gateway::GameId;

// --- Inbound Commands ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType { Connect, MakeMove, Leave, Resign }

/// A move as it travels on the wire: 1-based rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMove {
    pub start_row: i32,
    pub start_col: i32,
    pub end_row: i32,
    pub end_col: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceType>,
}

impl WireMove {
    /// The engine move, or None if a square lies off the board.
    pub fn to_move(&self) -> Option<Move> {
        let start = Position::try_new(self.start_row, self.start_col)?;
        let end = Position::try_new(self.end_row, self.end_col)?;
        Some(Move::new(start, end, self.promotion))
    }
}

impl From<Move> for WireMove {
    fn from(mv: Move) -> Self {
        WireMove {
            start_row: mv.start.row() as i32,
            start_col: mv.start.col() as i32,
            end_row: mv.end.row() as i32,
            end_col: mv.end.col() as i32,
            promotion: mv.promotion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGameCommand {
    #[serde(rename = "type")]
    pub command_type: CommandType,
    #[serde(rename = "authToken")]
    pub auth_token: String,
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub chess_move: Option<WireMove>,
}

impl UserGameCommand {
    fn new(command_type: CommandType, auth_token: &str, game_id: GameId) -> Self {
        UserGameCommand { command_type, auth_token: auth_token.to_string(), game_id, chess_move: None }
    }

    pub fn connect(auth_token: &str, game_id: GameId) -> Self {
        UserGameCommand::new(CommandType::Connect, auth_token, game_id)
    }

    pub fn make_move(auth_token: &str, game_id: GameId, mv: Move) -> Self {
        UserGameCommand { chess_move: Some(mv.into()), ..UserGameCommand::new(CommandType::MakeMove, auth_token, game_id) }
    }

    pub fn leave(auth_token: &str, game_id: GameId) -> Self {
        UserGameCommand::new(CommandType::Leave, auth_token, game_id)
    }

    pub fn resign(auth_token: &str, game_id: GameId) -> Self {
        UserGameCommand::new(CommandType::Resign, auth_token, game_id)
    }

    /// Parses one inbound frame.
    pub fn from_json(text: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(text).map_err(|e| ServiceError::BadRequest(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// --- Outbound Messages ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    LoadGame { board: Board },
    Notification { message: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn load_game(board: &Board) -> Self {
        ServerMessage::LoadGame { board: board.copy() }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        ServerMessage::Notification { message: message.into() }
    }

    pub fn error(err: &ServiceError) -> Self {
        ServerMessage::Error { message: format!("Error: {}", err) }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
