//! Outbound side of a client connection.
//!
//! A send never blocks the caller: it either queues the message or fails. The coordinator
//! treats any failure as the connection being gone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc as async_mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::protocol::ServerMessage;

pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn send(&self, message: &ServerMessage) -> Result<(), SendError>;

    fn is_open(&self) -> bool;

    /// Closes the connection. Later sends fail with `SendError::Closed`.
    fn close(&self);
}

// --- Socket ---

/// Queues messages for the task that writes a client's socket.
///
/// The writer task owns the receiving half. When it gives up on the socket (a write failed or
/// ran past the send timeout) it drops the receiver, and every later send fails. A queue that
/// fills up means the peer stopped reading, which also counts as a failed send.
#[derive(Debug)]
pub struct SocketConnection {
    id: ConnectionId,
    capacity: usize,
    outbox: Mutex<Option<async_mpsc::Sender<ServerMessage>>>,
}

impl SocketConnection {
    pub fn new(capacity: usize) -> (Arc<SocketConnection>, async_mpsc::Receiver<ServerMessage>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = async_mpsc::channel(capacity);
        let connection = SocketConnection { id: next_connection_id(), capacity, outbox: Mutex::new(Some(sender)) };
        (Arc::new(connection), receiver)
    }
}

impl Connection for SocketConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        let mut outbox = self.outbox.lock();
        let sender = outbox.as_ref().ok_or(SendError::Closed)?;
        match sender.try_send(message.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                // Dropping the sender lets the writer finish what is queued and hang up.
                *outbox = None;
                Err(SendError::Backlogged(self.capacity))
            }
            Err(TrySendError::Closed(_)) => {
                *outbox = None;
                Err(SendError::Closed)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.outbox.lock().as_ref().is_some_and(|sender| !sender.is_closed())
    }

    fn close(&self) {
        self.outbox.lock().take();
    }
}

// --- In-Process Channel ---

/// Delivers messages into an `mpsc` channel. Dropping the receiver closes the connection.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    sender: Mutex<mpsc::Sender<ServerMessage>>,
    open: AtomicBool,
}

impl ChannelConnection {
    pub fn new() -> (Arc<ChannelConnection>, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel();
        let connection = ChannelConnection {
            id: next_connection_id(),
            sender: Mutex::new(sender),
            open: AtomicBool::new(true),
        };
        (Arc::new(connection), receiver)
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        self.sender.lock().send(message.clone()).map_err(|_| {
            self.open.store(false, Ordering::SeqCst);
            SendError::Closed
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
