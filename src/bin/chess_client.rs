//! Terminal client: `chess_client <addr> <token> <game-id> [white|black]`.
//!
//! `<addr>` is `host:port` or a full `ws://` URL. The optional side only picks the board
//! orientation and the squares `O-O` / `O-O-O` map to.

use std::env;
use std::error::Error;
use std::process;
use std::sync::Arc;

use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use parking_lot::Mutex;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rust_chess_live::chess::notation::{self, parse_move};
use rust_chess_live::chess::{Board, ChessGame, Color, Move, Position};
use rust_chess_live::error::NotationError;
use rust_chess_live::server::WS_PATH;
use rust_chess_live::{GameId, ServerMessage, UserGameCommand};

type Outgoing = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// The last board the server sent, shared between the socket reader and the input loop.
type LastBoard = Arc<Mutex<Option<Board>>>;

enum UserInput {
    Move(Move),
    Resign,
    Leave,
    Redraw,
    Highlight(Position),
    Help,
    Quit,
}

fn parse_user_input(input: &str, side: Color) -> Result<UserInput, NotationError> {
    let lower = input.trim().to_lowercase();
    let castle = |col: u8| {
        let row = side.home_row();
        Move::plain(Position::new(row, 5), Position::new(row, col))
    };
    match lower.as_str() {
        "resign" => Ok(UserInput::Resign),
        "leave" => Ok(UserInput::Leave),
        "redraw" => Ok(UserInput::Redraw),
        "help" => Ok(UserInput::Help),
        "quit" | "exit" => Ok(UserInput::Quit),
        "o-o" | "0-0" => Ok(UserInput::Move(castle(7))),
        "o-o-o" | "0-0-0" => Ok(UserInput::Move(castle(3))),
        other => match other.strip_prefix("highlight") {
            Some(square) => Position::from_algebraic(square.trim())
                .map(UserInput::Highlight)
                .ok_or_else(|| NotationError::InvalidSquare(square.trim().to_string())),
            None => parse_move(other.strip_prefix("move ").unwrap_or(other)).map(UserInput::Move),
        },
    }
}

/// `board` with every square the piece on `square` may move to marked, or None if the
/// square is empty.
fn highlight(board: &Board, side: Color, square: Position) -> Option<String> {
    let moves = ChessGame::with_board(board.clone(), side).valid_moves(square)?;
    let targets: Vec<Position> = moves.iter().map(|mv| mv.end).collect();
    Some(board.render_marked(side, &targets))
}

fn print_message(message: ServerMessage, side: Color, last_board: &LastBoard) {
    match message {
        ServerMessage::LoadGame { board } => {
            println!("\n{}\n", board.render(side));
            *last_board.lock() = Some(board);
        }
        ServerMessage::Notification { message } => println!("* {}", message),
        ServerMessage::Error { message } => println!("! {}", message),
    }
}

async fn send(outgoing: &mut Outgoing, command: &UserGameCommand) -> Result<(), Box<dyn Error>> {
    outgoing.send(Message::Text(command.to_json()?.into())).await?;
    Ok(())
}

fn usage() -> ! {
    eprintln!("usage: chess_client <addr> <token> <game-id> [white|black]");
    process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 {
        usage();
    }
    let (addr, token) = (&args[0], &args[1]);
    let game_id: GameId = args[2].parse().unwrap_or_else(|_| usage());
    let side = match args.get(3).map(|s| s.to_lowercase()).as_deref() {
        None | Some("white") => Color::White,
        Some("black") => Color::Black,
        Some(_) => usage(),
    };
    let url = if addr.starts_with("ws://") || addr.starts_with("wss://") {
        addr.clone()
    } else {
        format!("ws://{}{}", addr, WS_PATH)
    };

    let (socket, _) = connect_async(url.as_str()).await?;
    let (mut outgoing, mut incoming) = socket.split();
    let last_board: LastBoard = Arc::new(Mutex::new(None));

    let shown = Arc::clone(&last_board);
    tokio::spawn(async move {
        while let Some(Ok(frame)) = incoming.next().await {
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match ServerMessage::from_json(text.as_str()) {
                Ok(message) => print_message(message, side, &shown),
                Err(e) => eprintln!("Unreadable message from server: {}", e),
            }
        }
        println!("\nConnection closed by server.");
        process::exit(0);
    });

    println!("==============================");
    println!("|   Rust Chess (Live)        |");
    println!("==============================");
    print_help();
    send(&mut outgoing, &UserGameCommand::connect(token, game_id)).await?;

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_user_input(&line, side) {
            Ok(UserInput::Move(mv)) => {
                println!("Sending {}", notation::describe_move(&mv));
                send(&mut outgoing, &UserGameCommand::make_move(token, game_id, mv)).await?;
            }
            Ok(UserInput::Resign) => send(&mut outgoing, &UserGameCommand::resign(token, game_id)).await?,
            Ok(UserInput::Leave) => {
                send(&mut outgoing, &UserGameCommand::leave(token, game_id)).await?;
                break;
            }
            Ok(UserInput::Redraw) => match last_board.lock().as_ref() {
                Some(board) => println!("\n{}\n", board.render(side)),
                None => println!("No board received yet."),
            },
            Ok(UserInput::Highlight(square)) => match last_board.lock().as_ref() {
                Some(board) => match highlight(board, side, square) {
                    Some(text) => println!("\n{}\n", text),
                    None => println!("No piece on {}.", square),
                },
                None => println!("No board received yet."),
            },
            Ok(UserInput::Help) => print_help(),
            Ok(UserInput::Quit) => break,
            Err(e) => println!("Input Error: {}", e),
        }
    }

    let _ = outgoing.close().await;
    println!("\nGame session finished.");
    Ok(())
}

/// Prints available commands.
fn print_help() {
    println!("\nAvailable Commands:");
    println!("  <move>         Enter a move in coordinate notation (e.g., e2e4, e2 e4, move e7e8q)");
    println!("                 Promotion (q, r, b, n) is required when a pawn reaches the last row.");
    println!("  O-O / O-O-O    Castle kingside / queenside.");
    println!("  redraw         Show the current board again.");
    println!("  highlight <sq> Mark the squares the piece on <sq> can move to (e.g., highlight e2).");
    println!("  resign         Forfeit the game.");
    println!("  leave          Leave the game and give up your seat.");
    println!("  help           Show this help message.");
    println!("  quit / exit    Disconnect without leaving the game.");
    println!();
}
