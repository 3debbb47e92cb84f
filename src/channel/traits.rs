//! Core traits for typed subscriptions.

use serde::de::DeserializeOwned;

/// An inbound message kind with a fixed `type` tag and a known shape.
///
/// Implementors deserialize from the whole decoded object, `type` field included, so a
/// struct only needs to name the fields it cares about.
///
/// # Example
///
/// ```
/// use asterix_channel::channel::Event;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Pong {
///     seq: u64,
/// }
///
/// impl Event for Pong {
///     const TYPE: &'static str = "pong";
/// }
/// ```
pub trait Event: DeserializeOwned + Send + 'static {
    /// Value of the `type` discriminator this event is routed by.
    const TYPE: &'static str;
}
