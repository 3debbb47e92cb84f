#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::{SinkExt as _, StreamExt as _};
use strum_macros::Display;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::config::Config;
use super::error::ChannelError;
use super::reconnect::PendingReconnect;
use super::registry::HandlerRegistry;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in flight
    Connecting,
    /// Connected; frames flow both ways
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// Connection lost; a reconnect is scheduled
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The status shown to users for this state.
    #[must_use]
    pub const fn status(self) -> ConnectionStatus {
        match self {
            Self::Connecting => ConnectionStatus::Loading,
            Self::Open { .. } => ConnectionStatus::Connected,
            Self::Closed => ConnectionStatus::Disconnected,
        }
    }
}

/// User-facing connection indicator.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Loading,
    Connected,
    Disconnected,
}

/// State and outbound path shared between the driver and every [`Channel`](super::Channel)
/// handle.
///
/// The outbound sender exists exactly while the state is `Open`; both are swapped under the
/// same lock so a send can never slip into a connection other than the one it observed.
pub(crate) struct Link {
    state_tx: watch::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Link {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            state_tx,
            outbound: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Hand `text` to the live connection. Returns `false` when there is none.
    pub(crate) fn transmit(&self, text: String) -> bool {
        // Option<Sender> has no inconsistent intermediate state, so a poisoned lock is usable.
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(tx) if self.state().is_open() => tx.send(text).is_ok(),
            _ => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    status = %self.state().status(),
                    "Channel not open, message dropped"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = &text;
                false
            }
        }
    }

    fn transition(&self, outbound: Option<mpsc::UnboundedSender<String>>, state: ConnectionState) {
        let mut slot = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = outbound;
        self.state_tx.send_replace(state);

        #[cfg(feature = "tracing")]
        tracing::debug!(status = %state.status(), "Channel state changed");
    }

    fn set_connecting(&self) {
        self.transition(None, ConnectionState::Connecting);
    }

    fn set_open(&self, outbound: mpsc::UnboundedSender<String>) {
        self.transition(
            Some(outbound),
            ConnectionState::Open {
                since: Instant::now(),
            },
        );
    }

    fn set_closed(&self) {
        self.transition(None, ConnectionState::Closed);
    }
}

/// Owns the socket and runs every lifecycle transition and dispatch, one at a time.
pub(crate) struct Driver {
    endpoint: String,
    config: Config,
    link: Arc<Link>,
    registry: Arc<HandlerRegistry>,
}

impl Driver {
    pub(crate) fn new(
        endpoint: String,
        config: Config,
        link: Arc<Link>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            endpoint,
            config,
            link,
            registry,
        }
    }

    /// Connect, serve until closure, wait out the reconnect delay, repeat. Never returns on
    /// its own; the owning [`Channel`](super::Channel) aborts it.
    pub(crate) async fn run(self) {
        let (mut pending, mut wake_rx) = PendingReconnect::new();

        loop {
            self.link.set_connecting();

            match connect_async(&self.endpoint).await {
                Ok((ws_stream, _)) => {
                    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                    self.link.set_open(outbound_tx);

                    #[cfg(feature = "tracing")]
                    tracing::info!(endpoint = %self.endpoint, "Channel connected");

                    if let Err(e) = self.serve(ws_stream, outbound_rx).await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %e, "Channel connection lost");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }
                }
                Err(e) => {
                    let error = crate::error::Error::from(e);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(endpoint = %self.endpoint, error = %error, "Unable to connect");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &error;
                }
            }

            // Closure is the only trigger for scheduling; errors above were just logged.
            self.link.set_closed();
            pending.schedule(self.config.reconnect_delay);

            loop {
                let Some(generation) = wake_rx.recv().await else {
                    return;
                };
                if pending.accept(generation) {
                    break;
                }
            }
        }
    }

    /// Pump one open connection. Returns when it closes for any reason.
    async fn serve(
        &self,
        ws_stream: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
    ) -> Result<()> {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(text = %text.as_str(), "Received frame");

                            self.registry.dispatch_frame(text.as_str());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(ChannelError::ConnectionClosed.into());
                        }
                        Some(Err(e)) => {
                            return Err(ChannelError::Connection(e).into());
                        }
                        Some(Ok(_)) => {
                            // Binary frames carry nothing for us; ping/pong is answered by tungstenite.
                        }
                    }
                }

                Some(text) = outbound_rx.recv() => {
                    write
                        .send(Message::Text(text.into()))
                        .await
                        .map_err(ChannelError::Connection)?;
                }
            }
        }
    }
}
