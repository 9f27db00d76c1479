/// Code attached to every warning surfaced in `ext.warnings`.
pub const GENERIC_WARNING_CODE: i32 = 999;

/// Scope under which bypass warnings are reported in `ext.warnings`.
pub const PREBID_WARNING_SCOPE: &str = "prebid";

/// Last warning appended whenever a stored response replaces the auction.
pub const AUCTION_SKIPPED_WARNING: &str = "no auction. response defined by storedauctionresponse";

pub const NULL_SEAT_BID_WARNING: &str = "SeatBid can't be null in stored response";
pub const EMPTY_SEAT_WARNING: &str = "Seat can't be empty in stored response seatBid";
pub const EMPTY_BIDS_WARNING: &str = "There must be at least one bid in stored response seatBid";

/// Prefix for environment variables overriding settings.
pub const ENV_PREFIX: &str = "SKIPPED_AUCTION";
