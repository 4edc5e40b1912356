//! Multiplayer chess over WebSocket, one JSON message per frame.
//!
//! [`chess`] is the rules engine. [`coordinator::Coordinator`] keeps the live participants of
//! each game, applies their commands through a [`gateway::Gateway`] and broadcasts the results
//! over [`connection::Connection`]s. [`server::Server`] puts it behind a WebSocket endpoint.

pub mod chess;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod server;

pub use config::ServerConfig;
pub use coordinator::{Coordinator, ParticipationRecord, Role};
pub use error::ServiceError;
pub use gateway::{GameId, GameRecord, Gateway, MemoryGateway};
pub use protocol::{ServerMessage, UserGameCommand};
