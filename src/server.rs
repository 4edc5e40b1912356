//! WebSocket front end: one JSON message per text frame.
//!
//! Every client gets a reader loop and a writer task. The reader hands commands to the
//! coordinator one at a time, in arrival order. The writer drains the client's outbox and gives
//! up on the socket as soon as one frame takes longer than the send timeout.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionId, SocketConnection};
use crate::coordinator::Coordinator;
use crate::protocol::{ServerMessage, UserGameCommand};

/// Path clients open the WebSocket on.
pub const WS_PATH: &str = "/ws";

#[derive(Clone)]
struct AppState {
    coordinator: Arc<Coordinator>,
    send_timeout: Duration,
    outbox_capacity: usize,
}

pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    pub async fn bind(config: &ServerConfig, coordinator: Arc<Coordinator>) -> io::Result<Server> {
        let listener = TcpListener::bind(config.bind_address.as_str()).await?;
        info!(address = %listener.local_addr()?, path = WS_PATH, "listening");
        let state = AppState {
            coordinator,
            send_timeout: config.send_timeout(),
            outbox_capacity: config.outbox_capacity,
        };
        Ok(Server { listener, state })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves clients until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        let app = Router::new().route(WS_PATH, get(ws_handler)).with_state(self.state);
        axum::serve(self.listener, app).await
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();
    let (connection, outbox) = SocketConnection::new(state.outbox_capacity);
    let id = connection.id();
    let connection: Arc<dyn Connection> = connection;
    info!(connection = id, "connection accepted");

    let mut writer = tokio::spawn(write_frames(id, sink, outbox, state.send_timeout));
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = &mut writer => break,
        };
        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(connection = id, error = %e, "read failed");
                break;
            }
        };

        match UserGameCommand::from_json(text.as_str()) {
            Ok(command) => {
                let coordinator = Arc::clone(&state.coordinator);
                let requester = Arc::clone(&connection);
                // Room locks are blocking locks; keep them off the async workers.
                let handled = tokio::task::spawn_blocking(move || coordinator.handle(&requester, &command)).await;
                if let Err(e) = handled {
                    error!(connection = id, error = %e, "command handler failed");
                    break;
                }
            }
            Err(e) => state.coordinator.reject(&connection, &e),
        }
        if !connection.is_open() {
            break;
        }
    }

    connection.close();
    let coordinator = Arc::clone(&state.coordinator);
    if let Err(e) = tokio::task::spawn_blocking(move || coordinator.disconnect(id)).await {
        error!(connection = id, error = %e, "could not release connection");
    }
    info!(connection = id, "connection closed");
}

/// Writes queued messages to the socket until the outbox closes or a write fails. Returning
/// drops the outbox, so every later send to this connection fails.
async fn write_frames(
    id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<ServerMessage>,
    send_timeout: Duration,
) {
    while let Some(message) = outbox.recv().await {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(connection = id, error = %e, "could not encode message");
                continue;
            }
        };
        match timeout(send_timeout, sink.send(Message::Text(json.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection = id, error = %e, "write failed");
                return;
            }
            Err(_) => {
                warn!(connection = id, timeout_ms = send_timeout.as_millis() as u64, "write timed out");
                return;
            }
        }
    }
    let _ = timeout(send_timeout, sink.close()).await;
}
