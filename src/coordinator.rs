//! Live session coordinator.
//!
//! Keeps the connections watching each game, runs inbound commands against the stored game
//! record and fans the results out. Every command for one game id runs under that game's
//! room lock, from fetching the record through the last broadcast, so moves on the same game
//! are applied one at a time and each sees the previous one's state. Rooms of different games
//! share nothing but the short lookup in the room table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::chess::notation::describe_move;
use crate::chess::Color;
use crate::connection::{Connection, ConnectionId};
use crate::error::ServiceError;
use crate::gateway::{GameId, GameRecord, Gateway};
use crate::protocol::{CommandType, ServerMessage, UserGameCommand, WireMove};

// --- Participation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role { White, Black, Observer }

impl Role {
    /// WHITE or BLACK if `username` holds that seat in `record`, else OBSERVER.
    pub fn of(record: &GameRecord, username: &str) -> Role {
        match record.seat_of(username) {
            Some(Color::White) => Role::White,
            Some(Color::Black) => Role::Black,
            None => Role::Observer,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            Role::White => Some(Color::White),
            Role::Black => Some(Color::Black),
            Role::Observer => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::White => write!(f, "WHITE"),
            Role::Black => write!(f, "BLACK"),
            Role::Observer => write!(f, "OBSERVER"),
        }
    }
}

/// One connection's membership in one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipationRecord {
    pub connection: ConnectionId,
    pub username: String,
    pub role: Role,
}

struct Participant {
    record: ParticipationRecord,
    connection: Arc<dyn Connection>,
}

// --- Game Rooms ---

#[derive(Default)]
struct GameRoom {
    participants: Vec<Participant>,
}

impl GameRoom {
    fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        self.participants.iter().find(|p| p.record.connection == connection).map(|p| p.record.role)
    }

    fn remove(&mut self, connection: ConnectionId) {
        self.participants.retain(|p| p.record.connection != connection);
    }

    /// Sends to one participant, dropping it if the send fails.
    fn send_to(&mut self, game_id: GameId, connection: ConnectionId, message: &ServerMessage) {
        self.participants.retain(|p| p.record.connection != connection || deliver(game_id, p, message));
    }

    /// Sends to every participant except `except`. Participants whose send fails are dropped
    /// and the broadcast carries on.
    fn broadcast(&mut self, game_id: GameId, message: &ServerMessage, except: Option<ConnectionId>) {
        self.participants.retain(|p| Some(p.record.connection) == except || deliver(game_id, p, message));
    }
}

fn deliver(game_id: GameId, participant: &Participant, message: &ServerMessage) -> bool {
    match participant.connection.send(message) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                game_id,
                connection = participant.record.connection,
                user = %participant.record.username,
                error = %e,
                "pruning unreachable participant"
            );
            false
        }
    }
}

// --- Coordinator ---

pub struct Coordinator {
    gateway: Arc<dyn Gateway>,
    rooms: Mutex<HashMap<GameId, Arc<Mutex<GameRoom>>>>,
}

impl Coordinator {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Coordinator { gateway, rooms: Mutex::new(HashMap::new()) }
    }

    /// Runs one inbound command. A failure is reported to `connection` alone as an `ERROR`.
    pub fn handle(&self, connection: &Arc<dyn Connection>, command: &UserGameCommand) {
        let token = command.auth_token.as_str();
        let game_id = command.game_id;
        let result = match command.command_type {
            CommandType::Connect => self.connect(connection, token, game_id),
            CommandType::MakeMove => self.make_move(connection, token, game_id, command.chess_move),
            CommandType::Resign => self.resign(connection, token, game_id),
            CommandType::Leave => self.leave(connection, token, game_id),
        };

        if let Err(e) = result {
            match &e {
                ServiceError::Storage(reason) => error!(game_id, reason = %reason, "storage failure"),
                _ => debug!(game_id, connection = connection.id(), command = ?command.command_type, error = %e, "command rejected"),
            }
            self.reject(connection, &e);
        }
    }

    /// Sends an `ERROR` for `err` to one connection.
    pub fn reject(&self, connection: &Arc<dyn Connection>, err: &ServiceError) {
        if let Err(e) = connection.send(&ServerMessage::error(err)) {
            debug!(connection = connection.id(), error = %e, "could not deliver error");
        }
    }

    /// Registers `connection` with the game, sends it the board and tells the others.
    pub fn connect(&self, connection: &Arc<dyn Connection>, token: &str, game_id: GameId) -> Result<(), ServiceError> {
        self.with_room(game_id, |room: &mut GameRoom| -> Result<(), ServiceError> {
            let username = self.gateway.resolve_identity(token)?;
            let record = self.gateway.fetch_game(game_id)?;
            let role = Role::of(&record, &username);
            let id = connection.id();

            room.remove(id);
            room.participants.push(Participant {
                record: ParticipationRecord { connection: id, username: username.clone(), role },
                connection: Arc::clone(connection),
            });
            info!(game_id, connection = id, user = %username, role = %role, "participant joined");

            room.send_to(game_id, id, &ServerMessage::load_game(record.game.board()));
            let joined = ServerMessage::notification(format!("{} joined the game as {}", username, role));
            room.broadcast(game_id, &joined, Some(id));
            Ok(())
        })
    }

    /// Applies a move by the player whose turn it is, then sends everyone the new board.
    pub fn make_move(
        &self,
        connection: &Arc<dyn Connection>,
        token: &str,
        game_id: GameId,
        chess_move: Option<WireMove>,
    ) -> Result<(), ServiceError> {
        self.with_room(game_id, |room: &mut GameRoom| -> Result<(), ServiceError> {
            let username = self.gateway.resolve_identity(token)?;
            let mut record = self.gateway.fetch_game(game_id)?;
            if record.game.is_over() {
                return Err(ServiceError::GameOver);
            }

            let mover = record.game.turn();
            if record.player(mover) != Some(username.as_str()) {
                let reason = match record.seat_of(&username) {
                    Some(_) => format!("it is {}'s turn", mover),
                    None => "observers cannot make moves".to_string(),
                };
                return Err(ServiceError::Unauthorized(reason));
            }

            let mv = chess_move
                .ok_or_else(|| ServiceError::BadRequest("MAKE_MOVE requires a move".to_string()))?
                .to_move()
                .ok_or_else(|| ServiceError::InvalidMove("squares must be within rows and columns 1 to 8".to_string()))?;
            record.game.make_move(&mv)?;
            self.gateway.persist_game(game_id, &record)?;
            info!(game_id, user = %username, mv = %mv, "move applied");

            room.broadcast(game_id, &ServerMessage::load_game(record.game.board()), None);
            let moved = format!("{} moved {}", player_label(&record, mover), describe_move(&mv));
            room.broadcast(game_id, &ServerMessage::notification(moved), Some(connection.id()));
            if let Some(status) = status_message(&record) {
                room.broadcast(game_id, &ServerMessage::notification(status), None);
            }
            Ok(())
        })
    }

    /// Ends the game in the opponent's favour.
    pub fn resign(&self, connection: &Arc<dyn Connection>, token: &str, game_id: GameId) -> Result<(), ServiceError> {
        self.with_room(game_id, |room: &mut GameRoom| -> Result<(), ServiceError> {
            let username = self.gateway.resolve_identity(token)?;
            let mut record = self.gateway.fetch_game(game_id)?;
            let color = record
                .seat_of(&username)
                .ok_or_else(|| ServiceError::Unauthorized("only players can resign".to_string()))?;
            if record.game.is_over() {
                return Err(ServiceError::GameOver);
            }

            record.game.resign(color);
            self.gateway.persist_game(game_id, &record)?;
            info!(game_id, connection = connection.id(), user = %username, color = %color, "game ended by resignation");

            let message = format!("{} resigned. {} wins!", username, player_label(&record, color.opponent()));
            room.broadcast(game_id, &ServerMessage::notification(message), None);
            Ok(())
        })
    }

    /// Closes the requester's connection and frees the seat it was playing from.
    pub fn leave(&self, connection: &Arc<dyn Connection>, token: &str, game_id: GameId) -> Result<(), ServiceError> {
        self.with_room(game_id, |room: &mut GameRoom| -> Result<(), ServiceError> {
            let username = self.gateway.resolve_identity(token)?;
            let mut record = self.gateway.fetch_game(game_id)?;
            let id = connection.id();

            let role = room.role_of(id).unwrap_or_else(|| Role::of(&record, &username));
            if let Some(color) = role.color().filter(|&c| record.player(c) == Some(username.as_str())) {
                record.clear_seat(color);
                self.gateway.persist_game(game_id, &record)?;
                debug!(game_id, user = %username, color = %color, "seat freed");
            }

            room.remove(id);
            connection.close();
            info!(game_id, connection = id, user = %username, "participant left");

            let left = ServerMessage::notification(format!("{} left the game", username));
            room.broadcast(game_id, &left, None);
            Ok(())
        })
    }

    /// Forgets a connection whose client has gone away, in every game it had joined. Seats
    /// stay claimed; only LEAVE frees them.
    pub fn disconnect(&self, connection: ConnectionId) {
        let rooms: Vec<(GameId, Arc<Mutex<GameRoom>>)> =
            self.rooms.lock().iter().map(|(&game_id, room)| (game_id, Arc::clone(room))).collect();
        for (game_id, room) in rooms {
            let mut guard = room.lock();
            if let Some(role) = guard.role_of(connection) {
                guard.remove(connection);
                info!(game_id, connection, role = %role, "participant disconnected");
            }
            drop(guard);
            drop(room);
            self.collect_room(game_id);
        }
    }

    /// Snapshot of the participants currently registered for `game_id`.
    pub fn participants(&self, game_id: GameId) -> Vec<ParticipationRecord> {
        let room = match self.rooms.lock().get(&game_id) {
            Some(room) => Arc::clone(room),
            None => return Vec::new(),
        };
        let guard = room.lock();
        guard.participants.iter().map(|p| p.record.clone()).collect()
    }

    /// Number of games that currently have a room.
    pub fn active_games(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Runs `op` while holding the room lock for `game_id`, creating the room if needed.
    /// Participants whose connection has already closed are dropped first.
    fn with_room<T>(&self, game_id: GameId, op: impl FnOnce(&mut GameRoom) -> T) -> T {
        let room = Arc::clone(self.rooms.lock().entry(game_id).or_default());
        let mut guard = room.lock();
        guard.participants.retain(|p| p.connection.is_open());
        let result = op(&mut *guard);
        drop(guard);
        drop(room);
        self.collect_room(game_id);
        result
    }

    /// Drops the room for `game_id` if it has no participants and no command is using it.
    fn collect_room(&self, game_id: GameId) {
        let mut rooms = self.rooms.lock();
        // Clones are only taken under the table lock, so a count of one cannot grow here.
        let idle = rooms.get(&game_id).is_some_and(|room| {
            Arc::strong_count(room) == 1 && room.try_lock().is_some_and(|r| r.participants.is_empty())
        });
        if idle {
            rooms.remove(&game_id);
            debug!(game_id, "closed idle game room");
        }
    }
}

/// "alice (WHITE)", or just the color when the seat is empty.
fn player_label(record: &GameRecord, color: Color) -> String {
    match record.player(color) {
        Some(username) => format!("{} ({})", username, color),
        None => color.to_string(),
    }
}

/// Checkmate or stalemate if the position has ended, otherwise check, otherwise nothing.
fn status_message(record: &GameRecord) -> Option<String> {
    let game = &record.game;
    let turn = game.turn();
    let colors = [turn, turn.opponent()];

    if let Some(&mated) = colors.iter().find(|&&c| game.is_in_checkmate(c)) {
        info!(game_id = record.game_id, winner = %mated.opponent(), "game ended by checkmate");
        return Some(format!(
            "{} is in checkmate. {} wins!",
            player_label(record, mated),
            player_label(record, mated.opponent())
        ));
    }
    if game.is_in_stalemate(turn) {
        info!(game_id = record.game_id, "game ended in stalemate");
        return Some(format!("Stalemate: {} has no legal moves. The game is a draw.", player_label(record, turn)));
    }
    colors
        .iter()
        .find(|&&c| game.is_in_check(c))
        .map(|&c| format!("{} is in check", player_label(record, c)))
}
