use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use rust_chess_live::chess::{Color, Move, Position};
use rust_chess_live::connection::{ChannelConnection, Connection};
use rust_chess_live::protocol::WireMove;
use rust_chess_live::server::{Server, WS_PATH};
use rust_chess_live::{Coordinator, MemoryGateway, ServerConfig, ServerMessage, UserGameCommand};

const SEND_TIMEOUT_MS: u64 = 250;

fn wire(from: &str, to: &str) -> WireMove {
    let square = |s: &str| Position::from_algebraic(s).expect("valid square");
    WireMove::from(Move::plain(square(from), square(to)))
}

fn drain(rx: &Receiver<ServerMessage>) {
    while rx.try_recv().is_ok() {}
}

/// A spectator that stops reading its socket must not hold up the game: once a frame to it
/// has been stuck for longer than the send timeout it is dropped from the room, and every move
/// meanwhile completes without waiting on it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_observer_is_pruned_without_stalling_moves() {
    let gateway = Arc::new(MemoryGateway::new());
    // Long names make every "moved" notification large, so the socket buffers fill quickly.
    let white_name = format!("white-{}", "w".repeat(64 * 1024));
    let black_name = format!("black-{}", "b".repeat(64 * 1024));
    let white = gateway.register(&white_name).expect("registers");
    let black = gateway.register(&black_name).expect("registers");
    let observer = gateway.register("carol").expect("registers");
    let game_id = gateway.create_game("stalled").expect("creates");
    gateway.join_game(&white, game_id, Color::White).expect("seat free");
    gateway.join_game(&black, game_id, Color::Black).expect("seat free");

    let coordinator = Arc::new(Coordinator::new(gateway));
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        send_timeout_ms: SEND_TIMEOUT_MS,
        // Large enough that only the write timeout can give up on the observer.
        outbox_capacity: 1_000_000,
        ..ServerConfig::default()
    };
    let server = Server::bind(&config, Arc::clone(&coordinator)).await.expect("binds");
    let addr = server.local_addr().expect("bound address");
    tokio::spawn(server.run());

    let (mut spectator, _) = connect_async(format!("ws://{}{}", addr, WS_PATH)).await.expect("handshake");
    let connect = UserGameCommand::connect(&observer, game_id).to_json().expect("serializes");
    spectator.send(Message::Text(connect.into())).await.expect("write");
    let first = timeout(Duration::from_secs(5), spectator.next()).await.expect("board arrives in time");
    assert!(matches!(first, Some(Ok(Message::Text(_)))));
    // From here on the spectator never reads again.

    let players = Arc::clone(&coordinator);
    let (worst, pruned) = tokio::task::spawn_blocking(move || {
        let (w_chan, w_rx) = ChannelConnection::new();
        let (b_chan, b_rx) = ChannelConnection::new();
        let w_conn: Arc<dyn Connection> = w_chan;
        let b_conn: Arc<dyn Connection> = b_chan;
        players.connect(&w_conn, &white, game_id).expect("white connects");
        players.connect(&b_conn, &black, game_id).expect("black connects");

        let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
        let deadline = Instant::now() + Duration::from_secs(30);
        let mut worst = Duration::ZERO;
        let mut ply = 0;
        while Instant::now() < deadline {
            if !players.participants(game_id).iter().any(|p| p.username == "carol") {
                return (worst, true);
            }
            let (from, to) = shuffle[ply % shuffle.len()];
            let (conn, token) = if ply % 2 == 0 { (&w_conn, &white) } else { (&b_conn, &black) };
            let started = Instant::now();
            players.make_move(conn, token, game_id, Some(wire(from, to))).expect("knight shuffle is legal");
            worst = worst.max(started.elapsed());
            drain(&w_rx);
            drain(&b_rx);
            ply += 1;
        }
        (worst, false)
    })
    .await
    .expect("mover thread");

    assert!(pruned, "the stalled observer is dropped from the room");
    assert!(
        worst < Duration::from_millis(SEND_TIMEOUT_MS),
        "slowest move took {:?}, longer than the send timeout",
        worst
    );
    let roles: Vec<Color> = coordinator
        .participants(game_id)
        .iter()
        .filter_map(|p| p.role.color())
        .collect();
    assert_eq!(roles, vec![Color::White, Color::Black]);
    drop(spectator);
}

#[tokio::test]
async fn commands_from_one_socket_are_answered_in_order() {
    let gateway = Arc::new(MemoryGateway::new());
    let token = gateway.register("alice").expect("registers");
    let game_id = gateway.create_game("ordered").expect("creates");
    gateway.join_game(&token, game_id, Color::White).expect("seat free");

    let coordinator = Arc::new(Coordinator::new(gateway));
    let config = ServerConfig { bind_address: "127.0.0.1:0".to_string(), ..ServerConfig::default() };
    let server = Server::bind(&config, coordinator).await.expect("binds");
    let addr = server.local_addr().expect("bound address");
    tokio::spawn(server.run());

    let (mut client, _) = connect_async(format!("ws://{}{}", addr, WS_PATH)).await.expect("handshake");
    let commands = [
        UserGameCommand::connect(&token, game_id),
        UserGameCommand::make_move(&token, game_id, wire("e2", "e4").to_move().expect("on board")),
        UserGameCommand::make_move(&token, game_id, wire("d2", "d4").to_move().expect("on board")),
    ];
    for command in &commands {
        let json = command.to_json().expect("serializes");
        client.send(Message::Text(json.into())).await.expect("write");
    }

    let mut received = Vec::new();
    while received.len() < 3 {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("server answers in time")
            .expect("socket open")
            .expect("readable frame");
        if let Message::Text(text) = frame {
            received.push(ServerMessage::from_json(text.as_str()).expect("valid message"));
        }
    }
    // Board on connect, board after e2e4, then the refusal of a second white move.
    assert!(matches!(received[0], ServerMessage::LoadGame { .. }));
    assert!(matches!(received[1], ServerMessage::LoadGame { .. }));
    assert_eq!(received[2], ServerMessage::Error { message: "Error: unauthorized: it is BLACK's turn".to_string() });
}
