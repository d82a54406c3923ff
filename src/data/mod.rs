//! Core data models for wine rating resolution
//!
//! This module contains the rating record produced by a successful lookup and the
//! outcome type that crosses the resolver boundary, including its plain-data wire form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire tag used in place of a rating tuple when a lookup fails
pub const ERROR_WIRE_TAG: &str = "error";

/// A rating record for a single wine as reported by Vivino
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResult {
    /// Average community rating (usually 0.0 - 5.0)
    pub rating: f64,
    /// Number of ratings the average is based on
    pub review_count: u64,
    /// Wine name as Vivino displays it
    pub display_name: String,
    /// Absolute URL of the wine's Vivino page
    pub detail_url: String,
}

impl RatingResult {
    /// Creates a new rating record
    pub fn new(
        rating: f64,
        review_count: u64,
        display_name: impl Into<String>,
        detail_url: impl Into<String>,
    ) -> Self {
        Self {
            rating,
            review_count,
            display_name: display_name.into(),
            detail_url: detail_url.into(),
        }
    }

    /// The "known empty" record returned when a page was fetched but held no rating data
    ///
    /// Note: this is indistinguishable from a genuine zero-rated wine with no name.
    pub fn empty() -> Self {
        Self::new(0.0, 0, "", "")
    }

    /// Whether this is the known-empty record
    pub fn is_empty(&self) -> bool {
        self.rating == 0.0
            && self.review_count == 0
            && self.display_name.is_empty()
            && self.detail_url.is_empty()
    }
}

/// Result of resolving a wine name
///
/// Failures are data rather than errors so that callers on the far side of a
/// message boundary can tell them apart without exception handling.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingOutcome {
    /// A rating record (possibly the known-empty one)
    Rated(RatingResult),
    /// The lookup failed; nothing was cached
    LookupFailed,
}

impl RatingOutcome {
    /// Returns the rating record, if any
    pub fn rating(&self) -> Option<&RatingResult> {
        match self {
            RatingOutcome::Rated(result) => Some(result),
            RatingOutcome::LookupFailed => None,
        }
    }

    /// Whether the lookup failed and should be retried later
    pub fn is_failure(&self) -> bool {
        matches!(self, RatingOutcome::LookupFailed)
    }

    /// Encodes the outcome as the legacy plain-data tuple
    ///
    /// `[rating, reviewCount, displayName, detailUrl]` on success, `["error"]` on failure.
    pub fn to_wire(&self) -> Value {
        match self {
            RatingOutcome::Rated(r) => {
                json!([r.rating, r.review_count, r.display_name, r.detail_url])
            }
            RatingOutcome::LookupFailed => json!([ERROR_WIRE_TAG]),
        }
    }

    /// Decodes the legacy plain-data tuple
    ///
    /// # Returns
    /// * `Some(RatingOutcome)` if the value has one of the two known shapes
    /// * `None` otherwise
    pub fn from_wire(value: &Value) -> Option<Self> {
        let items = value.as_array()?;

        if items.len() == 1 && items[0].as_str() == Some(ERROR_WIRE_TAG) {
            return Some(RatingOutcome::LookupFailed);
        }

        match items.as_slice() {
            [rating, count, name, url] => Some(RatingOutcome::Rated(RatingResult {
                rating: rating.as_f64()?,
                review_count: count.as_u64()?,
                display_name: name.as_str()?.to_string(),
                detail_url: url.as_str()?.to_string(),
            })),
            _ => None,
        }
    }
}

impl From<RatingResult> for RatingOutcome {
    fn from(result: RatingResult) -> Self {
        RatingOutcome::Rated(result)
    }
}
