//! Typed messages for the ASTERIX decoder backend.
//!
//! Nothing here is required to use a [`Channel`](crate::channel::Channel); raw
//! `serde_json::Value` messages work just as well. These types name the actions the backend
//! understands and the shapes it answers with.
//!
//! # Example
//!
//! ```rust, no_run
//! use asterix_channel::channel::Channel;
//! use asterix_channel::protocol::{ApplyFiltersResult, Filters, Request};
//!
//! # async fn example() {
//! let channel = Channel::default();
//!
//! let _table = channel.on(|result: ApplyFiltersResult| {
//!     println!("{} matching plots", result.data.records.len());
//! });
//!
//! let filters = Filters::builder().categories(vec!["CAT048".to_owned()]).build();
//! channel.send(&Request::apply_filters(filters));
//! # }
//! ```

pub mod request;
pub mod response;

pub use request::{Filters, Request};
pub use response::{
    ApplyFiltersResult, ClearDataResult, Detail, ErrorResponse, GetAllResult, GetMetadataResult,
    Metadata, Record, Records, Status,
};
