use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Barrier};
use std::thread;

use rust_chess_live::chess::{Color, Move, Position};
use rust_chess_live::connection::{ChannelConnection, Connection};
use rust_chess_live::error::GatewayError;
use rust_chess_live::{
    Coordinator, GameId, GameRecord, Gateway, MemoryGateway, Role, ServerMessage, UserGameCommand,
};

fn pos(s: &str) -> Position {
    Position::from_algebraic(s).expect("valid square")
}

fn mv(from: &str, to: &str) -> Move {
    Move::plain(pos(from), pos(to))
}

fn drain(rx: &Receiver<ServerMessage>) -> Vec<ServerMessage> {
    rx.try_iter().collect()
}

fn errors(messages: &[ServerMessage]) -> usize {
    messages.iter().filter(|m| matches!(m, ServerMessage::Error { .. })).count()
}

struct Client {
    conn: Arc<dyn Connection>,
    rx: Receiver<ServerMessage>,
    token: String,
}

impl Client {
    fn new(token: &str) -> Client {
        let (conn, rx) = ChannelConnection::new();
        Client { conn, rx, token: token.to_string() }
    }
}

/// Gateway whose writes can be switched off.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryGateway,
    broken: AtomicBool,
}

impl Gateway for FlakyStorage {
    fn resolve_identity(&self, token: &str) -> Result<String, GatewayError> {
        self.inner.resolve_identity(token)
    }

    fn fetch_game(&self, game_id: GameId) -> Result<GameRecord, GatewayError> {
        self.inner.fetch_game(game_id)
    }

    fn persist_game(&self, game_id: GameId, record: &GameRecord) -> Result<(), GatewayError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(GatewayError::Storage("disk full".to_string()));
        }
        self.inner.persist_game(game_id, record)
    }
}

struct Match {
    storage: Arc<FlakyStorage>,
    coordinator: Arc<Coordinator>,
    game_id: GameId,
    white: Client,
    black: Client,
    observer: Client,
}

impl Match {
    /// alice (WHITE), bob (BLACK) and carol watching, all connected.
    fn start() -> Match {
        let storage = Arc::new(FlakyStorage::default());
        let gateway = &storage.inner;
        let alice = gateway.register("alice").expect("registers");
        let bob = gateway.register("bob").expect("registers");
        let carol = gateway.register("carol").expect("registers");
        let game_id = gateway.create_game("live").expect("creates");
        gateway.join_game(&alice, game_id, Color::White).expect("seat free");
        gateway.join_game(&bob, game_id, Color::Black).expect("seat free");

        let coordinator = Arc::new(Coordinator::new(storage.clone()));
        let m = Match {
            storage,
            coordinator,
            game_id,
            white: Client::new(&alice),
            black: Client::new(&bob),
            observer: Client::new(&carol),
        };
        for client in [&m.white, &m.black, &m.observer] {
            m.coordinator.handle(&client.conn, &UserGameCommand::connect(&client.token, game_id));
        }
        for client in [&m.white, &m.black, &m.observer] {
            drain(&client.rx);
        }
        m
    }

    fn play(&self, client: &Client, from: &str, to: &str) {
        self.coordinator.handle(&client.conn, &UserGameCommand::make_move(&client.token, self.game_id, mv(from, to)));
    }

    fn record(&self) -> GameRecord {
        self.storage.fetch_game(self.game_id).expect("game exists")
    }
}

#[test]
fn connecting_assigns_roles_and_announces_joins() {
    let m = Match::start();
    let roles: Vec<(String, Role)> =
        m.coordinator.participants(m.game_id).into_iter().map(|p| (p.username, p.role)).collect();
    assert_eq!(
        roles,
        vec![("alice".to_string(), Role::White), ("bob".to_string(), Role::Black), ("carol".to_string(), Role::Observer)]
    );

    let late = Client::new(&m.observer.token);
    m.coordinator.handle(&late.conn, &UserGameCommand::connect(&late.token, m.game_id));
    assert!(matches!(drain(&late.rx).as_slice(), [ServerMessage::LoadGame { .. }]));
    let joined = ServerMessage::notification("carol joined the game as OBSERVER");
    assert_eq!(drain(&m.white.rx), vec![joined.clone()]);
    assert_eq!(drain(&m.observer.rx), vec![joined]);
}

#[test]
fn a_move_reaches_everyone_and_only_others_are_notified() {
    let m = Match::start();
    m.play(&m.white, "e2", "e4");

    let expected_board = m.record().game.board().clone();
    let load = ServerMessage::LoadGame { board: expected_board };
    let moved = ServerMessage::notification("alice (WHITE) moved e2 to e4");
    assert_eq!(drain(&m.white.rx), vec![load.clone()]);
    assert_eq!(drain(&m.black.rx), vec![load.clone(), moved.clone()]);
    assert_eq!(drain(&m.observer.rx), vec![load, moved]);
    assert_eq!(m.record().game.turn(), Color::Black);
}

#[test]
fn observer_moves_are_refused_without_touching_the_game() {
    let m = Match::start();
    let before = m.record();
    m.play(&m.observer, "e2", "e4");

    let reply = drain(&m.observer.rx);
    assert_eq!(reply, vec![ServerMessage::Error { message: "Error: unauthorized: observers cannot make moves".to_string() }]);
    assert!(drain(&m.white.rx).is_empty());
    assert!(drain(&m.black.rx).is_empty());
    assert_eq!(m.record(), before);
}

#[test]
fn illegal_and_out_of_turn_moves_go_back_to_the_mover_only() {
    let m = Match::start();
    m.play(&m.white, "e2", "e5");
    assert_eq!(errors(&drain(&m.white.rx)), 1);
    m.play(&m.black, "e7", "e5");
    assert_eq!(errors(&drain(&m.black.rx)), 1);

    let missing = UserGameCommand { chess_move: None, ..UserGameCommand::make_move(&m.white.token, m.game_id, mv("e2", "e4")) };
    m.coordinator.handle(&m.white.conn, &missing);
    assert_eq!(errors(&drain(&m.white.rx)), 1);

    assert!(drain(&m.observer.rx).is_empty());
    assert!(m.record().game.history().is_empty());
}

#[test]
fn checkmate_is_announced_and_ends_play() {
    let m = Match::start();
    m.play(&m.white, "f2", "f3");
    m.play(&m.black, "e7", "e5");
    m.play(&m.white, "g2", "g4");
    m.play(&m.black, "d8", "h4");

    let mate = ServerMessage::notification("alice (WHITE) is in checkmate. bob (BLACK) wins!");
    assert_eq!(drain(&m.white.rx).last(), Some(&mate));
    assert_eq!(drain(&m.black.rx).last(), Some(&mate));
    assert_eq!(drain(&m.observer.rx).last(), Some(&mate));

    m.play(&m.white, "a2", "a3");
    assert_eq!(
        drain(&m.white.rx),
        vec![ServerMessage::Error { message: "Error: the game is already over".to_string() }]
    );
    assert!(drain(&m.black.rx).is_empty());
}

#[test]
fn resignation_is_broadcast_and_blocks_further_moves() {
    let m = Match::start();
    m.coordinator.handle(&m.observer.conn, &UserGameCommand::resign(&m.observer.token, m.game_id));
    assert_eq!(errors(&drain(&m.observer.rx)), 1);

    m.coordinator.handle(&m.black.conn, &UserGameCommand::resign(&m.black.token, m.game_id));
    let resigned = ServerMessage::notification("bob resigned. alice (WHITE) wins!");
    for client in [&m.white, &m.black, &m.observer] {
        assert_eq!(drain(&client.rx), vec![resigned.clone()]);
    }
    assert!(m.record().game.is_over());

    m.play(&m.white, "e2", "e4");
    assert_eq!(errors(&drain(&m.white.rx)), 1);
    m.coordinator.handle(&m.white.conn, &UserGameCommand::resign(&m.white.token, m.game_id));
    assert_eq!(errors(&drain(&m.white.rx)), 1);
}

#[test]
fn leaving_frees_the_seat_for_someone_else() {
    let m = Match::start();
    m.coordinator.handle(&m.black.conn, &UserGameCommand::leave(&m.black.token, m.game_id));

    assert!(!m.black.conn.is_open());
    assert_eq!(m.record().black_username, None);
    assert_eq!(drain(&m.white.rx), vec![ServerMessage::notification("bob left the game")]);
    assert_eq!(m.coordinator.participants(m.game_id).len(), 2);

    m.storage.inner.join_game(&m.observer.token, m.game_id, Color::Black).expect("seat is free again");
    let seat_taker = Client::new(&m.observer.token);
    m.coordinator.handle(&seat_taker.conn, &UserGameCommand::connect(&seat_taker.token, m.game_id));
    assert_eq!(drain(&m.white.rx), vec![ServerMessage::notification("carol joined the game as BLACK")]);
}

#[test]
fn dead_connections_are_pruned_without_failing_the_move() {
    let m = Match::start();
    m.observer.conn.close();

    m.play(&m.white, "e2", "e4");
    assert_eq!(drain(&m.black.rx).len(), 2);
    let left: Vec<String> = m.coordinator.participants(m.game_id).into_iter().map(|p| p.username).collect();
    assert_eq!(left, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(m.record().game.history().len(), 1);
}

#[test]
fn storage_failures_are_reported_and_nothing_is_broadcast() {
    let m = Match::start();
    m.storage.broken.store(true, Ordering::SeqCst);
    m.play(&m.white, "e2", "e4");

    assert_eq!(
        drain(&m.white.rx),
        vec![ServerMessage::Error { message: "Error: storage failure: disk full".to_string() }]
    );
    assert!(drain(&m.black.rx).is_empty());
    assert!(m.record().game.history().is_empty());

    m.storage.broken.store(false, Ordering::SeqCst);
    m.play(&m.white, "e2", "e4");
    assert_eq!(m.record().game.history().len(), 1);
}

#[test]
fn racing_moves_on_one_game_are_applied_one_at_a_time() {
    for _ in 0..20 {
        let m = Match::start();
        let second = Client::new(&m.white.token);
        m.coordinator.handle(&second.conn, &UserGameCommand::connect(&second.token, m.game_id));
        drain(&second.rx);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [(m.white.conn.clone(), "e2", "e4"), (second.conn.clone(), "d2", "d4")]
            .into_iter()
            .map(|(conn, from, to)| {
                let coordinator = Arc::clone(&m.coordinator);
                let barrier = Arc::clone(&barrier);
                let command = UserGameCommand::make_move(&m.white.token, m.game_id, mv(from, to));
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.handle(&conn, &command);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("mover thread");
        }

        assert_eq!(m.record().game.history().len(), 1);
        assert_eq!(m.record().game.turn(), Color::Black);
        assert_eq!(errors(&drain(&m.white.rx)) + errors(&drain(&second.rx)), 1);
    }
}

#[test]
fn separate_games_run_side_by_side() {
    let gateway = Arc::new(MemoryGateway::new());
    let coordinator = Arc::new(Coordinator::new(gateway.clone()));
    let mut handles = Vec::new();
    for n in 0..4 {
        let white = gateway.register(&format!("white{}", n)).expect("registers");
        let black = gateway.register(&format!("black{}", n)).expect("registers");
        let game_id = gateway.create_game(&format!("board {}", n)).expect("creates");
        gateway.join_game(&white, game_id, Color::White).expect("seat free");
        gateway.join_game(&black, game_id, Color::Black).expect("seat free");

        let coordinator = Arc::clone(&coordinator);
        handles.push(thread::spawn(move || {
            let (w, _w_rx) = ChannelConnection::new();
            let (b, _b_rx) = ChannelConnection::new();
            let (w, b): (Arc<dyn Connection>, Arc<dyn Connection>) = (w, b);
            coordinator.connect(&w, &white, game_id).expect("connects");
            coordinator.connect(&b, &black, game_id).expect("connects");
            for (conn, token, from, to) in [(&w, &white, "g1", "f3"), (&b, &black, "g8", "f6"),
                                            (&w, &white, "f3", "g1"), (&b, &black, "f6", "g8")] {
                coordinator.make_move(conn, token, game_id, Some(mv(from, to).into())).expect("legal move");
            }
            game_id
        }));
    }
    for handle in handles {
        let game_id = handle.join().expect("game thread");
        assert_eq!(gateway.fetch_game(game_id).expect("exists").game.history().len(), 4);
    }
}
