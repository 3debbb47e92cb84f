//! Actions understood by the decoder backend.
//!
//! Every request serializes to an object with an `action` field plus action-specific fields,
//! ready for [`Channel::send`](crate::channel::Channel::send).

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;

/// A request to the backend.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Every record in the store, unfiltered
    GetAll,
    /// Records matching the given filters
    ApplyFilters(Filters),
    /// Store summary used to populate filter controls
    GetMetadata,
    /// Wipe the store
    ClearData,
}

impl Request {
    #[must_use]
    pub fn apply_filters(filters: Filters) -> Self {
        Self::ApplyFilters(filters)
    }

    /// Wire name of the action.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::GetAll => "get_all",
            Self::ApplyFilters(_) => "apply_filters",
            Self::GetMetadata => "get_metadata",
            Self::ClearData => "clear_data",
        }
    }

    /// `type` of the response the backend answers this request with.
    #[must_use]
    pub const fn response_type(&self) -> &'static str {
        match self {
            Self::GetAll => "get_all_result",
            Self::ApplyFilters(_) => "apply_filters_result",
            Self::GetMetadata => "get_metadata_result",
            Self::ClearData => "clear_data_result",
        }
    }
}

/// Filter criteria for [`Request::ApplyFilters`].
///
/// Every criterion is optional; an unset one places no restriction on that dimension and is
/// left out of the serialized request.
///
/// # Example
///
/// ```
/// use asterix_channel::protocol::request::{Filters, Request};
///
/// let request = Request::apply_filters(
///     Filters::builder()
///         .callsigns(vec!["IBE001".to_owned()])
///         .altitude_min(5000.0)
///         .build(),
/// );
/// assert_eq!(
///     serde_json::to_string(&request).unwrap(),
///     r#"{"action":"apply_filters","callsigns":["IBE001"],"altitude_min":5000.0}"#
/// );
/// ```
#[skip_serializing_none]
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Builder)]
pub struct Filters {
    /// Aircraft callsigns / flight IDs
    pub callsigns: Option<Vec<String>>,
    /// ASTERIX categories, e.g. `CAT048`
    pub categories: Option<Vec<String>>,
    /// Mode-A codes as octal strings
    pub squawks: Option<Vec<String>>,
    /// Lower altitude bound in feet, inclusive
    pub altitude_min: Option<f64>,
    /// Upper altitude bound in feet, inclusive
    pub altitude_max: Option<f64>,
    /// Earliest plot time, inclusive
    pub time_start: Option<DateTime<Utc>>,
    /// Latest plot time, inclusive
    pub time_end: Option<DateTime<Utc>>,
}
