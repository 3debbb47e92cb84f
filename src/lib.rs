#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod channel;
pub mod error;
pub mod protocol;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Backend endpoint used by [`Channel::default`](crate::channel::Channel).
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8765";

/// Environment variable applications read to override [`DEFAULT_ENDPOINT`].
pub const ENDPOINT_VAR: &str = "ASTERIX_WS_ENDPOINT";

/// The endpoint named by [`ENDPOINT_VAR`], falling back to [`DEFAULT_ENDPOINT`].
#[must_use]
pub fn endpoint_from_env() -> String {
    std::env::var(ENDPOINT_VAR)
        .ok()
        .filter(|endpoint| !endpoint.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned())
}
