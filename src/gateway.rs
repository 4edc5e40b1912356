//! Identity and game-record storage as seen by the coordinator.
//!
//! The coordinator only needs [`Gateway`]. [`MemoryGateway`] is the in-process store used by
//! the server binary and the tests; it keeps each game as a JSON snapshot so a fetched record
//! never aliases the stored one.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chess::{ChessGame, Color};
use crate::error::GatewayError;

pub type GameId = u32;

const TOKEN_LENGTH: usize = 32;

// --- Game Records ---

/// Durable snapshot of one game: seats, display name and engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    pub white_username: Option<String>,
    pub black_username: Option<String>,
    pub game_name: String,
    pub game: ChessGame,
}

impl GameRecord {
    pub fn new(game_id: GameId, game_name: &str) -> Self {
        GameRecord {
            game_id,
            white_username: None,
            black_username: None,
            game_name: game_name.to_string(),
            game: ChessGame::new(),
        }
    }

    pub fn player(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => self.white_username.as_deref(),
            Color::Black => self.black_username.as_deref(),
        }
    }

    /// The color `username` plays, WHITE first if they hold both seats.
    pub fn seat_of(&self, username: &str) -> Option<Color> {
        [Color::White, Color::Black].into_iter().find(|&c| self.player(c) == Some(username))
    }

    fn seat_mut(&mut self, color: Color) -> &mut Option<String> {
        match color {
            Color::White => &mut self.white_username,
            Color::Black => &mut self.black_username,
        }
    }

    pub fn clear_seat(&mut self, color: Color) {
        *self.seat_mut(color) = None;
    }
}

// --- Gateway Interface ---

pub trait Gateway: Send + Sync {
    /// The username an auth token belongs to.
    fn resolve_identity(&self, token: &str) -> Result<String, GatewayError>;

    fn fetch_game(&self, game_id: GameId) -> Result<GameRecord, GatewayError>;

    /// Overwrites the stored record for `game_id`.
    fn persist_game(&self, game_id: GameId, record: &GameRecord) -> Result<(), GatewayError>;
}

// --- In-Memory Implementation ---

#[derive(Debug, Default)]
struct MemoryStore {
    users: HashSet<String>,
    tokens: HashMap<String, String>,
    games: HashMap<GameId, String>,
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    store: Mutex<MemoryStore>,
}

fn generate_token() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(TOKEN_LENGTH).map(char::from).collect()
}

impl MemoryGateway {
    pub fn new() -> Self {
        MemoryGateway::default()
    }

    /// Registers `username` and returns a fresh auth token for it.
    pub fn register(&self, username: &str) -> Result<String, GatewayError> {
        self.register_with_token(username, &generate_token())
    }

    /// Registers `username` (if new) and binds `token` to it.
    pub fn register_with_token(&self, username: &str, token: &str) -> Result<String, GatewayError> {
        if username.trim().is_empty() || token.trim().is_empty() {
            return Err(GatewayError::BadRequest("username and token must not be blank".to_string()));
        }
        let mut store = self.store.lock();
        if let Some(owner) = store.tokens.get(token) {
            if owner != username {
                return Err(GatewayError::BadRequest("token is already in use".to_string()));
            }
        }
        store.users.insert(username.to_string());
        store.tokens.insert(token.to_string(), username.to_string());
        debug!(user = username, "registered user");
        Ok(token.to_string())
    }

    /// Creates a game in the starting position. Ids count up from 1.
    pub fn create_game(&self, game_name: &str) -> Result<GameId, GatewayError> {
        if game_name.trim().is_empty() {
            return Err(GatewayError::BadRequest("game name must not be blank".to_string()));
        }
        let mut store = self.store.lock();
        let game_id = store.games.keys().max().copied().unwrap_or(0) + 1;
        let snapshot = serde_json::to_string(&GameRecord::new(game_id, game_name))?;
        store.games.insert(game_id, snapshot);
        debug!(game_id, name = game_name, "created game");
        Ok(game_id)
    }

    /// Seats the token's user as `color`. Rejoining one's own seat is allowed.
    pub fn join_game(&self, token: &str, game_id: GameId, color: Color) -> Result<(), GatewayError> {
        let username = self.resolve_identity(token)?;
        let mut record = self.fetch_game(game_id)?;
        match record.player(color) {
            Some(current) if current != username => return Err(GatewayError::AlreadyTaken(color)),
            _ => {}
        }
        *record.seat_mut(color) = Some(username);
        self.persist_game(game_id, &record)
    }

    pub fn list_games(&self) -> Result<Vec<GameRecord>, GatewayError> {
        let store = self.store.lock();
        let mut games = store
            .games
            .values()
            .map(|json| serde_json::from_str(json))
            .collect::<Result<Vec<GameRecord>, _>>()?;
        games.sort_by_key(|g| g.game_id);
        Ok(games)
    }
}

impl Gateway for MemoryGateway {
    fn resolve_identity(&self, token: &str) -> Result<String, GatewayError> {
        self.store.lock().tokens.get(token).cloned().ok_or(GatewayError::Unauthorized)
    }

    fn fetch_game(&self, game_id: GameId) -> Result<GameRecord, GatewayError> {
        let store = self.store.lock();
        let snapshot = store.games.get(&game_id).ok_or(GatewayError::NotFound(game_id))?;
        Ok(serde_json::from_str(snapshot)?)
    }

    fn persist_game(&self, game_id: GameId, record: &GameRecord) -> Result<(), GatewayError> {
        let snapshot = serde_json::to_string(record)?;
        let mut store = self.store.lock();
        if !store.games.contains_key(&game_id) {
            return Err(GatewayError::NotFound(game_id));
        }
        store.games.insert(game_id, snapshot);
        Ok(())
    }
}
