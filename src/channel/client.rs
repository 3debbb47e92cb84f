use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use url::Url;

use super::config::Config;
use super::connection::{ConnectionState, ConnectionStatus, Driver, Link};
use super::message::Message;
use super::registry::{Handler, HandlerRegistry, Topic};
use super::traits::Event;
use crate::error::Error;
use crate::{DEFAULT_ENDPOINT, Result};

/// Persistent, self-healing message channel to the decoder backend.
///
/// Construction starts the connection immediately in a background task; a closed connection
/// is retried after [`Config::reconnect_delay`], forever. Handlers are registered per message
/// `type` (or for every message via [`Topic::Any`]) and survive reconnects.
///
/// Cloning is cheap and every clone drives the same connection. The background task stops
/// once the last clone is dropped.
///
/// # Examples
///
/// ```rust, no_run
/// use asterix_channel::channel::{Channel, Config, Handler, Message};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let channel = Channel::new("ws://127.0.0.1:8765", Config::default())?;
///
///     let table = Handler::new(|message: &Message| {
///         println!("records: {:?}", message.data());
///     });
///     channel.subscribe("apply_filters_result", &table);
///
///     if !channel.send(&json!({ "action": "apply_filters", "callsigns": ["IBE001"] })) {
///         println!("backend unavailable, try again later");
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, Config::default())
            .expect("Channel with default endpoint should succeed")
    }
}

struct ChannelInner {
    /// Backend endpoint the driver connects to
    endpoint: String,
    /// Configuration for the connection
    config: Config,
    /// Shared state and outbound path
    link: Arc<Link>,
    /// Subscribers keyed by message type
    registry: Arc<HandlerRegistry>,
    /// Background connection task
    driver: AbortHandle,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl Channel {
    /// Validate `endpoint` and start connecting to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let url = Url::parse(endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "endpoint must use ws or wss, got `{}`",
                url.scheme()
            )));
        }

        let link = Arc::new(Link::new());
        let registry = Arc::new(HandlerRegistry::default());
        let driver = Driver::new(
            endpoint.to_owned(),
            config.clone(),
            Arc::clone(&link),
            Arc::clone(&registry),
        );
        let driver = tokio::spawn(driver.run()).abort_handle();

        Ok(Self {
            inner: Arc::new(ChannelInner {
                endpoint: endpoint.to_owned(),
                config,
                link,
                registry,
                driver,
            }),
        })
    }

    /// Serialize `message` and transmit it if the channel is open.
    ///
    /// Returns `false` without transmitting anything otherwise. Nothing is queued: a refused
    /// message is gone, and deciding whether to retry is up to the caller.
    pub fn send<M: Serialize + ?Sized>(&self, message: &M) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.inner.link.transmit(text),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Unable to serialize outbound message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                false
            }
        }
    }

    /// Register `handler` for `topic`. Registering the same handler twice invokes it twice.
    pub fn subscribe<T: Into<Topic>>(&self, topic: T, handler: &Handler) {
        self.inner.registry.subscribe(topic.into(), handler);
    }

    /// Remove every registration of `handler` under `topic`. No-op if there is none.
    pub fn unsubscribe<T: Into<Topic>>(&self, topic: T, handler: &Handler) {
        self.inner.registry.unsubscribe(&topic.into(), handler);
    }

    /// Register a callback for [`Event`] `E`, decoded from each matching message.
    ///
    /// Returns the handler so it can be unsubscribed later with `E::TYPE`.
    pub fn on<E, F>(&self, f: F) -> Handler
    where
        E: Event,
        F: Fn(E) + Send + Sync + 'static,
    {
        let handler = Handler::typed::<E, F>(f);
        self.subscribe(E::TYPE, &handler);
        handler
    }

    /// Stream of messages routed to `topic`.
    ///
    /// The backing subscription is removed when the stream is dropped. The stream never
    /// ends on its own; reconnects are invisible to it.
    pub fn stream<T: Into<Topic>>(&self, topic: T) -> impl Stream<Item = Message> + Send + use<T> {
        let topic = topic.into();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = Handler::new(move |message: &Message| {
            _ = tx.send(message.clone());
        });
        self.inner.registry.subscribe(topic.clone(), &handler);

        let guard = StreamGuard {
            registry: Arc::clone(&self.inner.registry),
            topic,
            handler,
        };

        stream! {
            let _guard = guard;
            while let Some(message) = rx.recv().await {
                yield message;
            }
        }
    }

    /// Whether the channel is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.link.state().is_open()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.link.state()
    }

    /// Get the current user-facing status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state().status()
    }

    /// Subscribe to connection state changes.
    ///
    /// Every transition is published, so this drives a status indicator directly.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.link.state_receiver()
    }

    /// Number of registrations under `topic`, duplicates included.
    #[must_use]
    pub fn handler_count<T: Into<Topic>>(&self, topic: T) -> usize {
        self.inner.registry.handler_count(&topic.into())
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

/// Unsubscribes a stream's handler when the stream goes away.
struct StreamGuard {
    registry: Arc<HandlerRegistry>,
    topic: Topic,
    handler: Handler,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.topic, &self.handler);
    }
}
