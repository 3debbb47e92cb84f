//! Connection status monitor.
//!
//! Connects to the decoder backend, prints every status transition and every inbound
//! message type, and keeps running across backend restarts.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=debug cargo run --example status_monitor
//! ```

use asterix_channel::channel::{Channel, Config, Handler, Message, Topic};
use asterix_channel::endpoint_from_env;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let channel = Channel::new(&endpoint_from_env(), Config::default())?;

    let audit = Handler::new(|message: &Message| {
        info!(msg_type = message.msg_type(), status = ?message.status(), "message");
    });
    channel.subscribe(Topic::Any, &audit);

    let mut state_rx = channel.state_receiver();
    info!(endpoint = channel.endpoint(), status = %channel.status());

    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        info!(status = %state.status(), "status changed");
    }

    Ok(())
}
