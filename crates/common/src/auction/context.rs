//! Per-request unit of work shared between the orchestrator and the bypass
//! resolver.

use crate::openrtb::{BidRequest, BidResponse};
use crate::settings::AuctionSettings;

use super::timeout::TimeoutContext;

/// State of one incoming auction request.
///
/// The synthesized response and the "auction skipped" marker are private and
/// only ever set together through [`AuctionContext::skip_auction`].
#[derive(Debug, Clone)]
pub struct AuctionContext {
    pub request: BidRequest,
    pub request_rejected: bool,
    /// Append-only diagnostics, in detection order.
    pub debug_warnings: Vec<String>,
    pub timeout: TimeoutContext,
    bid_response: Option<BidResponse>,
    auction_skipped: bool,
}

impl AuctionContext {
    #[must_use]
    pub fn new(request: BidRequest, timeout: TimeoutContext) -> Self {
        Self {
            request,
            request_rejected: false,
            debug_warnings: Vec::new(),
            timeout,
            bid_response: None,
            auction_skipped: false,
        }
    }

    /// Builds a context whose time budget is derived from the request and
    /// the auction settings.
    #[must_use]
    pub fn from_request(request: BidRequest, settings: &AuctionSettings) -> Self {
        let timeout = TimeoutContext::for_request(&request, settings);
        Self::new(request, timeout)
    }

    /// Marks the request as rejected by an earlier pipeline stage.
    #[must_use]
    pub fn rejected(mut self) -> Self {
        self.request_rejected = true;
        self
    }

    #[must_use]
    pub fn with_debug_warnings(mut self, warnings: Vec<String>) -> Self {
        self.debug_warnings = warnings;
        self
    }

    #[must_use]
    pub fn is_auction_skipped(&self) -> bool {
        self.auction_skipped
    }

    #[must_use]
    pub fn bid_response(&self) -> Option<&BidResponse> {
        self.bid_response.as_ref()
    }

    #[must_use]
    pub fn into_bid_response(self) -> Option<BidResponse> {
        self.bid_response
    }

    /// Attaches the stored response, appends the warnings gathered while
    /// resolving it and flags the auction as skipped.
    pub(crate) fn skip_auction(
        &mut self,
        response: BidResponse,
        warnings: Vec<String>,
    ) -> &BidResponse {
        self.debug_warnings.extend(warnings);
        self.auction_skipped = true;
        self.bid_response.insert(response)
    }
}
