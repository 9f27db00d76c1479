//! Stored response handling for auction requests.
//!
//! The auction pipeline consults [`BypassResolver`] before running any
//! bidder. When the request asks for a stored auction response, the real
//! auction is skipped and the stored seat bids are returned instead.
//!
//! Stored responses referenced by id are resolved through a
//! [`StoredResponseLookup`]; [`InMemoryStoredResponses`] is the bundled
//! implementation, optionally wrapped in [`DeadlineBoundLookup`].

use std::sync::Arc;

use error_stack::Report;

use crate::error::SkippedAuctionError;
use crate::settings::Settings;

pub mod bypass;
pub mod context;
pub mod stored_response;
pub mod timeout;

pub use bypass::{validate_seat_bids, BypassResolver};
pub use context::AuctionContext;
pub use stored_response::{
    DeadlineBoundLookup, InMemoryStoredResponses, LookupOutcome, StoredResponseLookup,
};
pub use timeout::{Deadline, TimeoutContext};

/// Build a bypass resolver backed by the stored responses configured in
/// `settings`.
///
/// # Errors
///
/// Returns an error if the configured stored response directory cannot be read.
pub fn build_resolver(settings: &Settings) -> Result<BypassResolver, Report<SkippedAuctionError>> {
    log::info!("Building stored response bypass resolver");

    let store = InMemoryStoredResponses::from_settings(&settings.stored_responses)?;
    let lookup: Arc<dyn StoredResponseLookup> = Arc::new(DeadlineBoundLookup::new(store));

    Ok(BypassResolver::from_settings(&settings.auction, lookup))
}
