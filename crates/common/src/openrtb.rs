use std::collections::HashMap;

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::GENERIC_WARNING_CODE;
use crate::error::SkippedAuctionError;

/// Minimal subset of an OpenRTB 2.x bid request needed to decide on a
/// stored response bypass. Everything else is carried through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    /// Unique ID of the bid request, provided by the exchange.
    #[serde(default)]
    pub id: String,
    /// Maximum time in milliseconds the caller allows for the auction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
    /// Currencies allowed for bids, in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<RequestExt>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl BidRequest {
    /// Parses a bid request body.
    ///
    /// # Errors
    ///
    /// - [`SkippedAuctionError::Json`] if the body is not a bid request object
    /// - [`SkippedAuctionError::InvalidRequest`] if the request has no `id`
    pub fn from_json(body: &str) -> Result<Self, Report<SkippedAuctionError>> {
        let request: Self =
            serde_json::from_str(body).change_context(SkippedAuctionError::Json {
                message: "Failed to parse bid request".to_string(),
            })?;

        if request.id.is_empty() {
            return Err(Report::new(SkippedAuctionError::InvalidRequest {
                message: "bid request id is missing".to_string(),
            }));
        }

        Ok(request)
    }

    /// Returns the `ext.prebid.storedauctionresponse` directive, if every
    /// level of the path is present.
    #[must_use]
    pub fn stored_auction_response(&self) -> Option<&ExtStoredAuctionResponse> {
        self.ext
            .as_ref()?
            .prebid
            .as_ref()?
            .storedauctionresponse
            .as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prebid: Option<ExtRequestPrebid>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtRequestPrebid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storedauctionresponse: Option<ExtStoredAuctionResponse>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// Directive asking for the auction to be replaced by a stored response.
///
/// Inline seat bids (`seatbidarr`) win over `id` when both are present.
/// Individual entries may be `null` on the wire, hence `Option<SeatBid>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtStoredAuctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        rename = "seatbidarr",
        skip_serializing_if = "Option::is_none"
    )]
    pub seat_bids: Option<Vec<Option<SeatBid>>>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// Minimal subset of an OpenRTB 2.x bid response, as synthesized for a
/// skipped auction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<ExtBidResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtBidResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmaxrequest: Option<u64>,
    /// Warnings grouped by scope (e.g. `"prebid"`), in detection order.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub warnings: HashMap<String, Vec<ExtBidderError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtBidderError {
    pub code: i32,
    pub message: String,
}

impl ExtBidderError {
    /// Wraps a warning text with the generic warning code.
    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            code: GENERIC_WARNING_CODE,
            message: message.into(),
        }
    }
}

/// A group of bids attributed to one demand source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeatBid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<Vec<Bid>>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl SeatBid {
    /// Builds a seat bid with the given seat name and bids.
    #[must_use]
    pub fn new(seat: impl Into<String>, bids: Vec<Bid>) -> Self {
        Self {
            seat: Some(seat.into()),
            bid: Some(bids),
            extra: HashMap::new(),
        }
    }

    /// A missing seat counts as empty.
    #[must_use]
    pub fn has_seat(&self) -> bool {
        self.seat.as_deref().is_some_and(|seat| !seat.is_empty())
    }

    /// A missing bid list counts as empty.
    #[must_use]
    pub fn has_bids(&self) -> bool {
        self.bid.as_ref().is_some_and(|bids| !bids.is_empty())
    }
}

/// A single bid. Forwarded verbatim; only the commonly inspected fields are
/// typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burl: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}
