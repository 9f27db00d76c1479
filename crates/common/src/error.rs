//! Error types for the skipped-auction service.
//!
//! Two families live here:
//!
//! - [`BypassError`]: the reasons a request is *not* eligible for a stored
//!   response bypass. These are return values telling the orchestrator to run
//!   the real auction; they never end up in the warning trail.
//! - [`SkippedAuctionError`]: infrastructure failures (settings, request
//!   parsing, stored response sources) reported through [`error_stack::Report`].

use derive_more::{Display, Error};

/// Message used when the orchestrator has already rejected the request.
pub const REJECTED_MESSAGE: &str = "Rejected request cannot be skipped";

/// Message used when the request carries no stored auction response directive.
pub const NOT_APPLICABLE_MESSAGE: &str =
    "the auction can not be skipped, ext.prebid.storedauctionresponse is absent";

/// Message used when the directive has neither an id nor inline seat bids.
pub const MALFORMED_MESSAGE: &str =
    "the auction can not be skipped, ext.prebid.storedauctionresponse can not be resolved properly";

/// Message used when a context has already been bypassed once.
pub const ALREADY_SKIPPED_MESSAGE: &str = "Auction has already been skipped";

/// Reasons the auction cannot be bypassed for a given request.
///
/// Each variant renders the exact text surfaced to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum BypassError {
    /// The request was rejected upstream.
    #[display("{}", REJECTED_MESSAGE)]
    Rejected,

    /// `ext.prebid.storedauctionresponse` is missing from the request.
    #[display("{}", NOT_APPLICABLE_MESSAGE)]
    NotApplicable,

    /// The directive is present but carries neither `id` nor `seatbidarr`.
    #[display("{}", MALFORMED_MESSAGE)]
    Malformed,

    /// The context already carries a bypass response.
    #[display("{}", ALREADY_SKIPPED_MESSAGE)]
    AlreadySkipped,
}

/// Infrastructure errors raised while configuring or feeding the service.
#[derive(Debug, Display, Error)]
pub enum SkippedAuctionError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Incoming request payload is unusable.
    #[display("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// JSON (de)serialization failure.
    #[display("JSON error: {message}")]
    Json { message: String },

    /// A stored response source could not be read.
    #[display("Stored response error: {message}")]
    StoredResponse { message: String },
}
