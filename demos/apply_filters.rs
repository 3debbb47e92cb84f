//! Request metadata and a filtered record set from the decoder backend.
//!
//! ```sh
//! ASTERIX_WS_ENDPOINT=ws://127.0.0.1:8765 cargo run --example apply_filters
//! ```

use std::time::Duration;

use asterix_channel::channel::{Channel, Config};
use asterix_channel::endpoint_from_env;
use asterix_channel::protocol::{
    ApplyFiltersResult, ErrorResponse, Filters, GetMetadataResult, Request,
};
use futures::StreamExt as _;
use tokio::time::timeout;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let channel = Channel::new(&endpoint_from_env(), Config::default())?;

    let _errors = channel.on(|error: ErrorResponse| {
        warn!(detail = ?error.detail(), "backend rejected request");
    });
    let _metadata = channel.on(|result: GetMetadataResult| {
        info!(
            records = result.data.record_count,
            callsigns = result.data.unique_callsigns.len(),
            "metadata"
        );
    });
    let _filtered = channel.on(|result: ApplyFiltersResult| {
        info!(count = ?result.data.count, "filtered records");
        for record in result.data.records.iter().take(5) {
            info!(callsign = ?record.callsign, altitude_ft = ?record.altitude_ft);
        }
    });
    let mut everything = Box::pin(channel.stream(Request::GetAll.response_type()));

    let mut state_rx = channel.state_receiver();
    timeout(Duration::from_secs(10), state_rx.wait_for(|state| state.is_open())).await??;

    channel.send(&Request::GetMetadata);
    channel.send(&Request::GetAll);
    let filters = Filters::builder()
        .categories(vec!["CAT048".to_owned()])
        .altitude_min(5000.0)
        .altitude_max(35000.0)
        .build();
    if !channel.send(&Request::apply_filters(filters)) {
        warn!("connection dropped before the filter request went out");
    }

    if let Ok(Some(message)) = timeout(Duration::from_secs(5), everything.next()).await {
        info!(msg_type = message.msg_type(), status = ?message.status(), "unfiltered records");
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    Ok(())
}
