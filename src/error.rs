//! Error types for the engine, the gateway, the transport and the session coordinator.
//!
//! Engine and gateway errors are converted into [`ServiceError`] at the coordinator
//! boundary; a `ServiceError` is always reported to the single connection that caused it
//! and never tears down the game it happened in.

use std::io;

use thiserror::Error;

use crate::chess::types::{Color, Move, Position};
use crate::gateway::GameId;

// --- Engine Errors ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("{0} king was not found on the board")]
    KingNotFound(Color),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("there is no piece on {0}")]
    NoPiece(Position),
    #[error("{piece} cannot move during {turn}'s turn")]
    NotYourTurn { piece: Color, turn: Color },
    #[error("{0} is not a legal move")]
    Illegal(Move),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotationError {
    #[error("invalid move format: '{0}'. Use a form like 'e2e4', 'e2 e4' or 'a7a8q'")]
    InvalidFormat(String),
    #[error("invalid promotion piece '{0}'. Use q, r, b or n")]
    InvalidPromotion(char),
    #[error("invalid square '{0}'. Use a name like 'e2'")]
    InvalidSquare(String),
}

// --- Gateway Errors ---

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("game {0} does not exist")]
    NotFound(GameId),
    #[error("{0} is already taken")]
    AlreadyTaken(Color),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("could not (de)serialize game record: {0}")]
    Serialization(#[from] serde_json::Error),
}

// --- Transport Errors ---

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,
    /// The outbox is full: the peer has stopped reading.
    #[error("{0} messages already waiting to be written")]
    Backlogged(usize),
}

// --- Coordinator Errors ---

/// Failures of one inbound command. Each becomes an `ERROR` message to the requester only.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("the game is already over")]
    GameOver,
    #[error("game {0} does not exist")]
    NotFound(GameId),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<MoveError> for ServiceError {
    fn from(e: MoveError) -> Self {
        ServiceError::InvalidMove(e.to_string())
    }
}

impl From<GatewayError> for ServiceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unauthorized => ServiceError::Unauthorized("invalid auth token".to_string()),
            GatewayError::NotFound(id) => ServiceError::NotFound(id),
            GatewayError::AlreadyTaken(color) => ServiceError::Unauthorized(format!("{} is already taken", color)),
            GatewayError::BadRequest(reason) => ServiceError::BadRequest(reason),
            GatewayError::Storage(reason) => ServiceError::Storage(reason),
            GatewayError::Serialization(e) => ServiceError::Storage(e.to_string()),
        }
    }
}

// --- Configuration Errors ---

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file '{0}': {1}")]
    Io(String, #[source] io::Error),
    #[error("could not parse config file '{0}': {1}")]
    Parse(String, #[source] serde_json::Error),
    #[error("invalid value for {0}: '{1}'")]
    InvalidEnv(&'static str, String),
}
