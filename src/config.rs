//! Server configuration: built-in defaults, an optional JSON file, then environment overrides.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chess::Color;
use crate::error::{ConfigError, GatewayError};
use crate::gateway::MemoryGateway;

pub const CONFIG_ENV: &str = "CHESS_CONFIG";
pub const BIND_ADDRESS_ENV: &str = "CHESS_BIND_ADDRESS";
pub const SEND_TIMEOUT_ENV: &str = "CHESS_SEND_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Write timeout per WebSocket frame. A write that takes longer counts as a failed send.
    pub send_timeout_ms: u64,
    /// Messages that may wait for one client's writer before sends to it start failing.
    pub outbox_capacity: usize,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub seed: SeedConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1:8080".to_string(),
            send_timeout_ms: 2000,
            outbox_capacity: 256,
            log_filter: "rust_chess_live=info".to_string(),
            seed: SeedConfig::default(),
        }
    }
}

/// Users and games to create in the memory gateway at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub users: Vec<SeedUser>,
    pub games: Vec<SeedGame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedGame {
    pub name: String,
    #[serde(default)]
    pub white: Option<String>,
    #[serde(default)]
    pub black: Option<String>,
}

impl ServerConfig {
    /// Reads `path` if given, otherwise starts from the defaults, then applies the
    /// `CHESS_BIND_ADDRESS` and `CHESS_SEND_TIMEOUT_MS` overrides.
    pub fn load(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
        let mut config = match path {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<ServerConfig, ConfigError> {
        let name = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(name.clone(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(name, e))
    }

    /// Applies overrides looked up through `lookup`, normally the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(address) = lookup(BIND_ADDRESS_ENV) {
            self.bind_address = address;
        }
        if let Some(raw) = lookup(SEND_TIMEOUT_ENV) {
            self.send_timeout_ms = match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(ConfigError::InvalidEnv(SEND_TIMEOUT_ENV, raw)),
            };
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms.max(1))
    }

    /// Registers the seed users and creates the seed games. Returns `(username, token)` pairs
    /// so generated tokens can be shown to the operator.
    pub fn seed(&self, gateway: &MemoryGateway) -> Result<Vec<(String, String)>, GatewayError> {
        let mut credentials = Vec::new();
        for user in &self.seed.users {
            let token = match &user.token {
                Some(token) => gateway.register_with_token(&user.username, token)?,
                None => gateway.register(&user.username)?,
            };
            credentials.push((user.username.clone(), token));
        }

        let token_of = |username: &str| {
            credentials
                .iter()
                .find(|(u, _)| u == username)
                .map(|(_, t)| t.clone())
                .ok_or_else(|| GatewayError::BadRequest(format!("seed game names unknown user '{}'", username)))
        };
        for game in &self.seed.games {
            let game_id = gateway.create_game(&game.name)?;
            for (color, player) in [(Color::White, &game.white), (Color::Black, &game.black)] {
                if let Some(username) = player {
                    gateway.join_game(&token_of(username.as_str())?, game_id, color)?;
                }
            }
            info!(game_id, name = %game.name, "seeded game");
        }
        Ok(credentials)
    }
}
