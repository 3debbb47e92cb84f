//! Messages the decoder backend answers with.
//!
//! Each response is an [`Event`] so it can be subscribed to with
//! [`Channel::on`](crate::channel::Channel::on).

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::channel::Event;

/// Outcome reported in every response.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// One decoded ASTERIX target report.
///
/// Every column may be missing: a partially decoded plot is still a record.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, Builder)]
pub struct Record {
    /// Absolute UTC time of the plot
    pub timestamp: Option<DateTime<Utc>>,
    /// System track number
    pub track_number: Option<i64>,
    /// Aircraft callsign / flight ID
    pub callsign: Option<String>,
    /// Mode-A code as an octal string
    pub squawk: Option<String>,
    /// WGS-84 latitude in degrees
    pub latitude: Option<f64>,
    /// WGS-84 longitude in degrees
    pub longitude: Option<f64>,
    /// Mode-C altitude in feet
    pub altitude_ft: Option<f64>,
    /// Ground speed in knots
    pub ground_speed: Option<f64>,
    /// Heading in degrees true
    pub heading: Option<f64>,
    /// ASTERIX category, e.g. `CAT048`
    pub category: Option<String>,
    /// `SAC:SIC` of the data source
    pub data_source: Option<String>,
}

/// Payload of record-bearing responses.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Records {
    #[serde(default)]
    pub records: Vec<Record>,
    /// Number of matches, sent with filtered results
    pub count: Option<usize>,
}

/// Store summary used to populate filter controls.
///
/// Time and altitude bounds are absent while the store is empty.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Metadata {
    pub record_count: usize,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unique_callsigns: Vec<String>,
    #[serde(default)]
    pub unique_categories: Vec<String>,
    #[serde(default)]
    pub unique_squawks: Vec<String>,
    pub altitude_min: Option<f64>,
    pub altitude_max: Option<f64>,
}

/// Free-text payload carried by acknowledgements and errors.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Detail {
    pub detail: Option<String>,
}

/// Answer to `get_all`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GetAllResult {
    pub status: Status,
    #[serde(default)]
    pub data: Records,
}

impl Event for GetAllResult {
    const TYPE: &'static str = "get_all_result";
}

/// Answer to `apply_filters`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ApplyFiltersResult {
    pub status: Status,
    #[serde(default)]
    pub data: Records,
}

impl Event for ApplyFiltersResult {
    const TYPE: &'static str = "apply_filters_result";
}

/// Answer to `get_metadata`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GetMetadataResult {
    pub status: Status,
    pub data: Metadata,
}

impl Event for GetMetadataResult {
    const TYPE: &'static str = "get_metadata_result";
}

/// Answer to `clear_data`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClearDataResult {
    pub status: Status,
    #[serde(default)]
    pub data: Detail,
}

impl Event for ClearDataResult {
    const TYPE: &'static str = "clear_data_result";
}

/// Rejection of a malformed or unknown request.
///
/// The backend puts `detail` either at the top level (malformed frames) or under `data`
/// (unknown actions); [`ErrorResponse::detail`] looks in both places.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorResponse {
    pub status: Option<Status>,
    pub detail: Option<String>,
    pub data: Option<Value>,
}

impl ErrorResponse {
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref().or_else(|| {
            self.data
                .as_ref()
                .and_then(|data| data.get("detail"))
                .and_then(Value::as_str)
        })
    }
}

impl Event for ErrorResponse {
    const TYPE: &'static str = "error";
}
