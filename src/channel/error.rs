#![expect(
    clippy::module_name_repetitions,
    reason = "ChannelError includes the module name to indicate its scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// Channel error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum ChannelError {
    /// Error connecting to or communicating with the backend
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Inbound frame is not valid JSON
    MessageParse(serde_json::Error),
    /// Inbound frame decoded to something other than a JSON object
    NotAnObject,
    /// Inbound frame has no string `type` discriminator
    MissingType,
    /// The connection was closed by the peer
    ConnectionClosed,
    /// A subscriber panicked while handling a message
    HandlerPanicked {
        /// Type of the message being dispatched
        msg_type: String,
        /// Panic payload, when it was a string
        reason: String,
    },
    /// A typed handler could not decode the payload it subscribed to
    PayloadMismatch {
        /// Type of the message being dispatched
        msg_type: String,
        /// Underlying decode failure
        source: serde_json::Error,
    },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to parse inbound frame: {e}"),
            Self::NotAnObject => write!(f, "Inbound frame is not a JSON object"),
            Self::MissingType => write!(f, "Inbound frame has no `type` field"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::HandlerPanicked { msg_type, reason } => {
                write!(f, "Handler for `{msg_type}` panicked: {reason}")
            }
            Self::PayloadMismatch { msg_type, source } => {
                write!(f, "Payload of `{msg_type}` does not match handler: {source}")
            }
        }
    }
}

impl StdError for ChannelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) | Self::PayloadMismatch { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<ChannelError> for crate::error::Error {
    fn from(e: ChannelError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(
            crate::error::Kind::WebSocket,
            ChannelError::Connection(e),
        )
    }
}
