//! Real-time board channel over a native WebSocket.
//!
//! The socket lives on a background thread. Broadcasts are decoded there and
//! handed over through a channel; [`Connection::poll_events`] drains them and
//! tracks the connection state. A dropped or refused connection is retried
//! after a fixed delay until [`Connection::close`].

use super::protocol::BoardEvent;
use super::{SyncError, SyncResult};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket, connect};
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events from the connection thread
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    /// An established connection dropped. A retry follows.
    Disconnected,
    Message(BoardEvent),
    /// Connecting failed. A retry follows.
    Error(String),
}

enum WsCommand {
    Close,
}

/// Why a connected session ended.
enum SessionEnd {
    Dropped,
    Closed,
}

/// Subscription to one board's broadcast channel.
pub struct Connection {
    state: ConnectionState,
    cmd_tx: Option<Sender<WsCommand>>,
    event_rx: Option<Receiver<ConnectionEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl Connection {
    /// Start connecting to a `ws` URL. `wss` is refused: the socket is
    /// built without TLS support.
    pub fn open(url: &str, reconnect_delay: Duration) -> SyncResult<Self> {
        let parsed = Url::parse(url).map_err(|e| SyncError::InvalidUrl(format!("{url}: {e}")))?;
        match parsed.scheme() {
            "ws" => {}
            "wss" => {
                return Err(SyncError::InvalidUrl(format!("TLS WebSocket not supported: {url}")));
            }
            other => {
                return Err(SyncError::InvalidUrl(format!(
                    "Invalid WebSocket URL scheme: {other}"
                )));
            }
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<ConnectionEvent>();
        let handle = thread::spawn(move || run(parsed, reconnect_delay, cmd_rx, event_tx));

        Ok(Self {
            state: ConnectionState::Connecting,
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
            _thread: Some(handle),
        })
    }

    /// Stop the connection and its retries.
    pub fn close(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Poll for pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    ConnectionEvent::Connected => self.state = ConnectionState::Connected,
                    ConnectionEvent::Disconnected | ConnectionEvent::Error(_) => {
                        self.state = ConnectionState::Disconnected
                    }
                    ConnectionEvent::Message(_) => {}
                }
                events.push(event);
            }
        }
        events
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn run(
    url: Url,
    reconnect_delay: Duration,
    cmd_rx: Receiver<WsCommand>,
    event_tx: Sender<ConnectionEvent>,
) {
    loop {
        log::info!("WebSocket thread: connecting to {}", url);
        match connect(url.as_str()) {
            Ok((socket, response)) => {
                log::info!("WebSocket connected, status: {}", response.status());
                let _ = event_tx.send(ConnectionEvent::Connected);
                match read_loop(socket, &cmd_rx, &event_tx) {
                    SessionEnd::Closed => break,
                    SessionEnd::Dropped => {
                        let _ = event_tx.send(ConnectionEvent::Disconnected);
                    }
                }
            }
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(ConnectionEvent::Error(format!("Connection failed: {}", e)));
            }
        }

        log::info!("WebSocket reconnecting in {:?}", reconnect_delay);
        match cmd_rx.recv_timeout(reconnect_delay) {
            Ok(WsCommand::Close) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    log::info!("WebSocket thread exiting");
}

/// First 100 characters of a payload, for logging.
fn preview(text: &str) -> &str {
    text.char_indices().nth(100).map_or(text, |(i, _)| &text[..i])
}

fn read_loop(
    mut socket: WebSocket<MaybeTlsStream<std::net::TcpStream>>,
    cmd_rx: &Receiver<WsCommand>,
    event_tx: &Sender<ConnectionEvent>,
) -> SessionEnd {
    // Short read timeout so close requests are noticed between reads.
    match socket.get_mut() {
        MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("TLS or other stream - using default timeout handling"),
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                return SessionEnd::Closed;
            }
            Err(TryRecvError::Disconnected) => {
                log::info!("WebSocket command channel disconnected");
                let _ = socket.close(None);
                return SessionEnd::Closed;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                log::debug!("WebSocket received: {}", preview(&txt));
                match serde_json::from_str::<BoardEvent>(&txt) {
                    Ok(event) => {
                        let _ = event_tx.send(ConnectionEvent::Message(event));
                    }
                    Err(e) => log::warn!("Failed to parse board event: {}", e),
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                return SessionEnd::Dropped;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                return SessionEnd::Dropped;
            }
        }
    }
}
