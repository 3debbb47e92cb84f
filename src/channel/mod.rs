//! Persistent message channel to the decoder backend.
//!
//! One [`Channel`] owns one WebSocket connection. It reconnects on its own after a fixed
//! delay and fans decoded inbound messages out to handlers registered per message `type`.
//!
//! # Architecture
//!
//! - [`Channel`]: the handle consumers share; `send`, `subscribe`, `unsubscribe`, state
//! - `connection`: the driver task that owns the socket and serializes every transition
//!   and dispatch
//! - `registry`: ordered handler lists with per-handler panic isolation
//! - `reconnect`: the single cancellable pending reconnect
//!
//! # Example
//!
//! ```rust, no_run
//! use asterix_channel::channel::{Channel, Handler, Message, Topic};
//!
//! # async fn example() -> asterix_channel::Result<()> {
//! let channel = Channel::default();
//!
//! let audit = Handler::new(|message: &Message| {
//!     println!("<- {}", message.msg_type());
//! });
//! channel.subscribe(Topic::Any, &audit);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
mod reconnect;
pub mod registry;
pub mod traits;

pub use client::Channel;
pub use config::Config;
pub use connection::{ConnectionState, ConnectionStatus};
#[expect(
    clippy::module_name_repetitions,
    reason = "ChannelError includes module name for clarity when used outside this module"
)]
pub use error::ChannelError;
pub use message::Message;
pub use registry::{Handler, Topic, WILDCARD};
pub use traits::Event;
