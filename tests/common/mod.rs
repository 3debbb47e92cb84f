#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use asterix_channel::channel::{Channel, ConnectionState};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(2);

/// Mock backend that records client frames, pushes frames to clients, and can drop every
/// live connection on demand.
pub struct MockBackend {
    addr: SocketAddr,
    /// Broadcast frames to ALL connected clients
    message_tx: broadcast::Sender<String>,
    /// Drop every live connection without a close handshake
    kick_tx: broadcast::Sender<()>,
    /// Text frames received from clients
    received_rx: mpsc::UnboundedReceiver<String>,
    /// When each WebSocket handshake completed
    accepted_rx: mpsc::UnboundedReceiver<Instant>,
}

impl MockBackend {
    /// Start a mock backend on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<String>(100);
        let (kick_tx, _) = broadcast::channel::<()>(8);
        let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel::<Instant>();

        let broadcast_tx = message_tx.clone();
        let kick = kick_tx.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                // Subscribe before the handshake so nothing sent after the client sees
                // `Open` can be missed.
                let mut msg_rx = broadcast_tx.subscribe();
                let mut kick_rx = kick.subscribe();

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                drop(accepted_tx.send(Instant::now()));

                let (mut write, mut read) = ws_stream.split();
                let received = received_tx.clone();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(received.send(text.to_string()));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            _ = kick_rx.recv() => break,
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            kick_tx,
            received_rx,
            accepted_rx,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a text frame to all connected clients.
    pub fn send(&self, frame: &str) {
        drop(self.message_tx.send(frame.to_owned()));
    }

    /// Abruptly drop every live connection.
    pub fn disconnect_all(&self) {
        drop(self.kick_tx.send(()));
    }

    /// Next frame a client sent, if one arrives in time.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.received_rx.recv()).await.ok().flatten()
    }

    /// Whether any client frame arrives within `within`.
    pub async fn received_within(&mut self, within: Duration) -> bool {
        timeout(within, self.received_rx.recv())
            .await
            .ok()
            .flatten()
            .is_some()
    }

    /// When the next handshake completes, if it does in `within`.
    pub async fn next_accept(&mut self, within: Duration) -> Option<Instant> {
        timeout(within, self.accepted_rx.recv()).await.ok().flatten()
    }
}

/// An endpoint nothing listens on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

/// Wait until the channel reports a state matching `predicate`.
pub async fn wait_for_state<F>(channel: &Channel, predicate: F) -> ConnectionState
where
    F: FnMut(&ConnectionState) -> bool,
{
    let mut state_rx = channel.state_receiver();
    let state = timeout(WAIT, state_rx.wait_for(predicate))
        .await
        .expect("timed out waiting for channel state")
        .unwrap();
    *state
}

pub async fn wait_until_open(channel: &Channel) {
    wait_for_state(channel, |state| state.is_open()).await;
}

/// Formatted log output collected from a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Number of captured lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture `WARN` and above on the current thread until the guard drops.
///
/// `#[tokio::test]` runs spawned tasks on the test thread, so the channel driver's events
/// are captured too.
#[cfg(feature = "tracing")]
pub fn capture_warnings() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
