//! Stored response bypass of the auction.
//!
//! Before the real auction runs, the orchestrator asks [`BypassResolver`]
//! whether the request carries an `ext.prebid.storedauctionresponse`
//! directive. If it does, the auction is replaced by the stored seat bids
//! (inline, or looked up by id) and a response is synthesized together with
//! a warning trail. Once a request is eligible the bypass always succeeds: a
//! failed lookup only degrades the response to zero seat bids.

use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Report;

use crate::constants::{
    AUCTION_SKIPPED_WARNING, EMPTY_BIDS_WARNING, EMPTY_SEAT_WARNING, NULL_SEAT_BID_WARNING,
    PREBID_WARNING_SCOPE,
};
use crate::error::BypassError;
use crate::openrtb::{
    BidResponse, ExtBidResponse, ExtBidderError, ExtStoredAuctionResponse, SeatBid,
};
use crate::settings::AuctionSettings;

use super::context::AuctionContext;
use super::stored_response::{LookupOutcome, StoredResponseLookup};

/// Where the stored seat bids come from once the request is eligible.
#[derive(Debug, Clone, PartialEq)]
enum StoredSource {
    Inline(Vec<Option<SeatBid>>),
    ById(String),
}

impl StoredSource {
    /// Inline seat bids win over the id, even when the list is empty.
    fn from_directive(directive: &ExtStoredAuctionResponse) -> Option<Self> {
        match (&directive.seat_bids, &directive.id) {
            (Some(seat_bids), _) => Some(Self::Inline(seat_bids.clone())),
            (None, Some(id)) => Some(Self::ById(id.clone())),
            (None, None) => None,
        }
    }
}

/// Decides whether an auction can be replaced by a stored response and, if
/// so, builds that response.
pub struct BypassResolver {
    lookup: Arc<dyn StoredResponseLookup>,
    default_currency: String,
}

impl BypassResolver {
    #[must_use]
    pub fn new(lookup: Arc<dyn StoredResponseLookup>) -> Self {
        Self {
            lookup,
            default_currency: AuctionSettings::default().default_currency,
        }
    }

    #[must_use]
    pub fn from_settings(
        settings: &AuctionSettings,
        lookup: Arc<dyn StoredResponseLookup>,
    ) -> Self {
        Self {
            lookup,
            default_currency: settings.default_currency.clone(),
        }
    }

    /// Tries to skip the auction for `context`.
    ///
    /// On success the context carries the synthesized response, the extended
    /// debug warnings and the skipped marker, and the attached response is
    /// returned. On failure the context is left untouched and the caller
    /// should run the real auction.
    ///
    /// # Errors
    ///
    /// - [`BypassError::Rejected`] if the request was rejected upstream
    /// - [`BypassError::AlreadySkipped`] if the context was already bypassed
    /// - [`BypassError::NotApplicable`] if the directive is absent
    /// - [`BypassError::Malformed`] if the directive has neither id nor seat bids
    pub async fn evaluate<'a>(
        &self,
        context: &'a mut AuctionContext,
    ) -> Result<&'a BidResponse, Report<BypassError>> {
        let source = check_eligibility(context).inspect_err(|report| {
            log::debug!(
                "Auction for request '{}' not skipped: {}",
                context.request.id,
                report.current_context()
            );
        })?;

        let mut warnings = Vec::new();
        let seat_bids = match source {
            StoredSource::Inline(entries) => {
                let (valid, validation_warnings) = validate_seat_bids(entries);
                warnings.extend(validation_warnings);
                valid
            }
            StoredSource::ById(id) => {
                match self.lookup.resolve(&id, context.timeout.deadline()).await {
                    LookupOutcome::Resolved(seat_bids) => seat_bids,
                    LookupOutcome::Failed(message) => {
                        log::warn!(
                            "Stored response lookup for id '{}' failed, skipping with no bids: {}",
                            id,
                            message
                        );
                        warnings.push(message);
                        Vec::new()
                    }
                }
            }
        };
        warnings.push(AUCTION_SKIPPED_WARNING.to_string());

        let response = self.build_bid_response(context, seat_bids, &warnings);
        log::info!(
            "Skipped auction for request '{}' with {} stored seat bids ({} warnings)",
            context.request.id,
            response.seatbid.len(),
            warnings.len()
        );
        Ok(context.skip_auction(response, warnings))
    }

    fn build_bid_response(
        &self,
        context: &AuctionContext,
        seat_bids: Vec<SeatBid>,
        new_warnings: &[String],
    ) -> BidResponse {
        let request = &context.request;
        let warnings: Vec<ExtBidderError> = context
            .debug_warnings
            .iter()
            .chain(new_warnings)
            .map(ExtBidderError::generic)
            .collect();

        BidResponse {
            id: request.id.clone(),
            seatbid: seat_bids,
            cur: Some(
                request
                    .cur
                    .first()
                    .cloned()
                    .unwrap_or_else(|| self.default_currency.clone()),
            ),
            ext: Some(ExtBidResponse {
                tmaxrequest: Some(request.tmax.unwrap_or(context.timeout.tmax_ms())),
                warnings: HashMap::from([(PREBID_WARNING_SCOPE.to_string(), warnings)]),
            }),
        }
    }
}

fn check_eligibility(context: &AuctionContext) -> Result<StoredSource, Report<BypassError>> {
    if context.request_rejected {
        return Err(Report::new(BypassError::Rejected));
    }
    if context.is_auction_skipped() {
        return Err(Report::new(BypassError::AlreadySkipped));
    }

    let directive = context
        .request
        .stored_auction_response()
        .ok_or_else(|| Report::new(BypassError::NotApplicable))?;

    StoredSource::from_directive(directive).ok_or_else(|| Report::new(BypassError::Malformed))
}

/// Drops unusable inline seat bids, keeping order. Returns the kept entries
/// and one warning per dropped entry.
#[must_use]
pub fn validate_seat_bids(entries: Vec<Option<SeatBid>>) -> (Vec<SeatBid>, Vec<String>) {
    let mut valid = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();

    for entry in entries {
        let warning = match entry {
            None => NULL_SEAT_BID_WARNING,
            Some(seat_bid) if !seat_bid.has_seat() => EMPTY_SEAT_WARNING,
            Some(seat_bid) if !seat_bid.has_bids() => EMPTY_BIDS_WARNING,
            Some(seat_bid) => {
                valid.push(seat_bid);
                continue;
            }
        };
        log::debug!("Dropping stored seat bid: {}", warning);
        warnings.push(warning.to_string());
    }

    (valid, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::stored_response::InMemoryStoredResponses;
    use crate::auction::timeout::{Deadline, TimeoutContext};
    use crate::constants::GENERIC_WARNING_CODE;
    use crate::openrtb::{Bid, BidRequest, ExtRequestPrebid, RequestExt};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tokio_test::{assert_err, assert_ok};

    /// Lookup double that records every call and answers with a fixed outcome.
    struct RecordingLookup {
        outcome: LookupOutcome,
        calls: Mutex<Vec<(String, Deadline)>>,
    }

    impl RecordingLookup {
        fn new(outcome: LookupOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.recorded().into_iter().map(|(id, _)| id).collect()
        }

        fn deadlines(&self) -> Vec<Deadline> {
            self.recorded()
                .into_iter()
                .map(|(_, deadline)| deadline)
                .collect()
        }

        fn recorded(&self) -> Vec<(String, Deadline)> {
            self.calls.lock().expect("lock should not be poisoned").clone()
        }
    }

    #[async_trait]
    impl StoredResponseLookup for RecordingLookup {
        async fn resolve(&self, id: &str, deadline: Deadline) -> LookupOutcome {
            self.calls
                .lock()
                .expect("lock should not be poisoned")
                .push((id.to_string(), deadline));
            self.outcome.clone()
        }
    }

    fn seat_bids(bid_ids: &[&str]) -> Vec<SeatBid> {
        bid_ids
            .iter()
            .map(|bid_id| {
                SeatBid::new(
                    "seat",
                    vec![Bid {
                        id: Some((*bid_id).to_string()),
                        ..Default::default()
                    }],
                )
            })
            .collect()
    }

    fn request_with(directive: Option<ExtStoredAuctionResponse>) -> BidRequest {
        BidRequest {
            id: "requestId".to_string(),
            tmax: Some(1000),
            cur: vec!["USD".to_string()],
            ext: Some(RequestExt {
                prebid: Some(ExtRequestPrebid {
                    storedauctionresponse: directive,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn directive(
        id: Option<&str>,
        seat_bids: Option<Vec<Option<SeatBid>>>,
    ) -> ExtStoredAuctionResponse {
        ExtStoredAuctionResponse {
            id: id.map(str::to_string),
            seat_bids,
            ..Default::default()
        }
    }

    fn context_for(request: BidRequest) -> AuctionContext {
        AuctionContext::new(request, TimeoutContext::starting_now(1000))
    }

    fn prebid_warnings(context: &AuctionContext) -> Vec<ExtBidderError> {
        context
            .bid_response()
            .and_then(|response| response.ext.as_ref())
            .and_then(|ext| ext.warnings.get(PREBID_WARNING_SCOPE))
            .cloned()
            .unwrap_or_default()
    }

    fn seat_bids_of(context: &AuctionContext) -> Vec<SeatBid> {
        context
            .bid_response()
            .map(|response| response.seatbid.clone())
            .unwrap_or_default()
    }

    async fn expect_not_skipped(mut context: AuctionContext, expected: BypassError) {
        let lookup = RecordingLookup::new(LookupOutcome::Resolved(vec![]));
        let resolver = BypassResolver::new(lookup.clone());
        let before = context.clone();

        let report = assert_err!(resolver.evaluate(&mut context).await);

        assert_eq!(*report.current_context(), expected);
        assert!(lookup.calls().is_empty(), "lookup should never be called");
        assert!(!context.is_auction_skipped());
        assert!(context.bid_response().is_none());
        assert_eq!(context.debug_warnings, before.debug_warnings);
    }

    #[tokio::test]
    async fn rejected_request_cannot_be_skipped() {
        let context = context_for(request_with(Some(directive(Some("id"), None)))).rejected();
        expect_not_skipped(context, BypassError::Rejected).await;
        assert_eq!(
            BypassError::Rejected.to_string(),
            "Rejected request cannot be skipped"
        );
    }

    #[tokio::test]
    async fn missing_request_ext_is_not_applicable() {
        let request = BidRequest {
            ext: None,
            ..request_with(None)
        };
        expect_not_skipped(context_for(request), BypassError::NotApplicable).await;
    }

    #[tokio::test]
    async fn missing_prebid_ext_is_not_applicable() {
        let request = BidRequest {
            ext: Some(RequestExt::default()),
            ..request_with(None)
        };
        expect_not_skipped(context_for(request), BypassError::NotApplicable).await;
    }

    #[tokio::test]
    async fn missing_directive_is_not_applicable() {
        expect_not_skipped(context_for(request_with(None)), BypassError::NotApplicable).await;
    }

    #[tokio::test]
    async fn directive_without_id_or_seat_bids_is_malformed() {
        let context = context_for(request_with(Some(directive(None, None))));
        expect_not_skipped(context, BypassError::Malformed).await;
    }

    #[tokio::test]
    async fn rejection_is_checked_before_directive() {
        let context = context_for(request_with(None)).rejected();
        expect_not_skipped(context, BypassError::Rejected).await;
    }

    #[tokio::test]
    async fn inline_seat_bids_are_returned_without_lookup() {
        let given = seat_bids(&["bidId1", "bidId2"]);
        let inline = given.iter().cloned().map(Some).collect();
        let lookup = RecordingLookup::new(LookupOutcome::Failed("unused".to_string()));
        let resolver = BypassResolver::new(lookup.clone());
        let mut context = context_for(request_with(Some(directive(Some("id"), Some(inline)))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert!(lookup.calls().is_empty(), "inline seat bids win over the id");
        assert!(context.is_auction_skipped());
        assert_eq!(
            context.debug_warnings,
            vec!["no auction. response defined by storedauctionresponse"]
        );

        let response = context.bid_response().expect("should have a response");
        assert_eq!(response.id, "requestId");
        assert_eq!(response.cur.as_deref(), Some("USD"));
        assert_eq!(response.seatbid, given);
        let ext = response.ext.as_ref().expect("should have response ext");
        assert_eq!(ext.tmaxrequest, Some(1000));
        assert_eq!(
            ext.warnings.get("prebid"),
            Some(&vec![ExtBidderError {
                code: GENERIC_WARNING_CODE,
                message: "no auction. response defined by storedauctionresponse".to_string(),
            }])
        );
    }

    #[tokio::test]
    async fn null_inline_seat_bid_is_dropped_with_warning() {
        let valid = seat_bids(&["bidId1"]).remove(0);
        let resolver = BypassResolver::new(RecordingLookup::new(LookupOutcome::Resolved(vec![])));
        let mut context = context_for(request_with(Some(directive(
            Some("id"),
            Some(vec![None, Some(valid.clone())]),
        ))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(
            context.debug_warnings,
            vec![
                "SeatBid can't be null in stored response",
                "no auction. response defined by storedauctionresponse"
            ]
        );
        assert_eq!(seat_bids_of(&context), vec![valid]);
    }

    #[tokio::test]
    async fn single_null_inline_seat_bid_yields_empty_response() {
        let resolver = BypassResolver::new(RecordingLookup::new(LookupOutcome::Resolved(vec![])));
        let mut context = context_for(request_with(Some(directive(Some("id"), Some(vec![None])))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert!(seat_bids_of(&context).is_empty());
        assert_eq!(
            prebid_warnings(&context),
            vec![
                ExtBidderError::generic("SeatBid can't be null in stored response"),
                ExtBidderError::generic("no auction. response defined by storedauctionresponse"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_seat_is_dropped_with_warning() {
        let entry = SeatBid {
            seat: Some(String::new()),
            ..Default::default()
        };
        let resolver = BypassResolver::new(RecordingLookup::new(LookupOutcome::Resolved(vec![])));
        let mut context =
            context_for(request_with(Some(directive(Some("id"), Some(vec![Some(entry)])))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(
            context.debug_warnings,
            vec![
                "Seat can't be empty in stored response seatBid",
                "no auction. response defined by storedauctionresponse"
            ]
        );
        assert!(seat_bids_of(&context).is_empty());
    }

    #[tokio::test]
    async fn empty_bids_are_dropped_with_warning() {
        let entry = SeatBid::new("seat", vec![]);
        let resolver = BypassResolver::new(RecordingLookup::new(LookupOutcome::Resolved(vec![])));
        let mut context =
            context_for(request_with(Some(directive(Some("id"), Some(vec![Some(entry)])))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(
            context.debug_warnings,
            vec![
                "There must be at least one bid in stored response seatBid",
                "no auction. response defined by storedauctionresponse"
            ]
        );
        assert!(seat_bids_of(&context).is_empty());
    }

    #[tokio::test]
    async fn empty_inline_list_still_skips_without_lookup() {
        let lookup = RecordingLookup::new(LookupOutcome::Resolved(seat_bids(&["unused"])));
        let resolver = BypassResolver::new(lookup.clone());
        let mut context = context_for(request_with(Some(directive(Some("id"), Some(vec![])))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert!(lookup.calls().is_empty());
        assert!(seat_bids_of(&context).is_empty());
        assert_eq!(
            context.debug_warnings,
            vec!["no auction. response defined by storedauctionresponse"]
        );
    }

    // A failed lookup does not abort the bypass: availability over completeness.
    #[tokio::test]
    async fn failed_lookup_still_skips_with_empty_seat_bids() {
        let lookup = RecordingLookup::new(LookupOutcome::Failed("no value".to_string()));
        let resolver = BypassResolver::new(lookup.clone());
        let mut context = context_for(request_with(Some(directive(Some("id"), None))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(lookup.calls(), vec!["id"]);
        assert!(context.is_auction_skipped());
        assert_eq!(
            context.debug_warnings,
            vec!["no value", "no auction. response defined by storedauctionresponse"]
        );
        assert!(seat_bids_of(&context).is_empty());
        assert_eq!(
            prebid_warnings(&context),
            vec![
                ExtBidderError::generic("no value"),
                ExtBidderError::generic("no auction. response defined by storedauctionresponse"),
            ]
        );
    }

    #[tokio::test]
    async fn lookup_receives_request_deadline_unchanged() {
        let lookup = RecordingLookup::new(LookupOutcome::Resolved(vec![]));
        let resolver = BypassResolver::new(lookup.clone());
        let start = Instant::now();
        let mut context = AuctionContext::new(
            request_with(Some(directive(Some("id"), None))),
            TimeoutContext::new(start, 700),
        );

        assert_ok!(resolver.evaluate(&mut context).await);

        let deadlines: Vec<Instant> = lookup.deadlines().iter().map(Deadline::instant).collect();
        assert_eq!(deadlines, vec![start + Duration::from_millis(700)]);
    }

    #[tokio::test]
    async fn evaluate_returns_the_attached_response() {
        let lookup = RecordingLookup::new(LookupOutcome::Resolved(seat_bids(&["bidId1"])));
        let resolver = BypassResolver::new(lookup);
        let mut context = context_for(request_with(Some(directive(Some("id"), None))));

        let returned = assert_ok!(resolver.evaluate(&mut context).await).clone();

        assert_eq!(returned.id, "requestId");
        assert_eq!(context.bid_response(), Some(&returned));
    }

    #[tokio::test]
    async fn resolved_lookup_seat_bids_are_forwarded_unchanged() {
        let given = seat_bids(&["bidId1", "bidId2"]);
        let lookup = RecordingLookup::new(LookupOutcome::Resolved(given.clone()));
        let resolver = BypassResolver::new(lookup.clone());
        let mut context = context_for(request_with(Some(directive(Some("id"), None))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(lookup.calls(), vec!["id"]);
        assert_eq!(seat_bids_of(&context), given);
        assert_eq!(
            context.debug_warnings,
            vec!["no auction. response defined by storedauctionresponse"]
        );
    }

    #[tokio::test]
    async fn existing_debug_warnings_precede_new_ones() {
        let resolver = BypassResolver::new(RecordingLookup::new(LookupOutcome::Failed(
            "no value".to_string(),
        )));
        let mut context = context_for(request_with(Some(directive(Some("id"), None))))
            .with_debug_warnings(vec!["earlier warning".to_string()]);

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(
            context.debug_warnings,
            vec![
                "earlier warning",
                "no value",
                "no auction. response defined by storedauctionresponse"
            ]
        );
        let messages: Vec<String> = prebid_warnings(&context)
            .into_iter()
            .map(|warning| warning.message)
            .collect();
        assert_eq!(messages, context.debug_warnings);
    }

    #[tokio::test]
    async fn second_evaluation_is_refused() {
        let resolver = BypassResolver::new(RecordingLookup::new(LookupOutcome::Resolved(vec![])));
        let mut context = context_for(request_with(Some(directive(Some("id"), None))));

        assert_ok!(resolver.evaluate(&mut context).await);
        let warnings_after_first = context.debug_warnings.clone();

        let report = assert_err!(resolver.evaluate(&mut context).await);
        assert_eq!(*report.current_context(), BypassError::AlreadySkipped);
        assert_eq!(context.debug_warnings, warnings_after_first);
    }

    #[tokio::test]
    async fn missing_currency_and_tmax_fall_back_to_settings() {
        let settings = AuctionSettings {
            default_currency: "EUR".to_string(),
            ..AuctionSettings::default()
        };
        let resolver = BypassResolver::from_settings(
            &settings,
            RecordingLookup::new(LookupOutcome::Resolved(vec![])),
        );
        let request = BidRequest {
            tmax: None,
            cur: vec![],
            ..request_with(Some(directive(Some("id"), None)))
        };
        let mut context = AuctionContext::new(request, TimeoutContext::starting_now(650));

        assert_ok!(resolver.evaluate(&mut context).await);

        let response = context.bid_response().expect("should have a response");
        assert_eq!(response.cur.as_deref(), Some("EUR"));
        assert_eq!(
            response.ext.as_ref().and_then(|ext| ext.tmaxrequest),
            Some(650)
        );
    }

    #[tokio::test]
    async fn in_memory_store_failure_is_reported_as_warning() {
        let resolver = BypassResolver::new(Arc::new(InMemoryStoredResponses::new()));
        let mut context = context_for(request_with(Some(directive(Some("unknown"), None))));

        assert_ok!(resolver.evaluate(&mut context).await);

        assert_eq!(
            context.debug_warnings,
            vec![
                "No stored auction response found for id: unknown",
                "no auction. response defined by storedauctionresponse"
            ]
        );
    }

    #[test]
    fn validate_seat_bids_keeps_order_and_reports_each_rejection() {
        let good = seat_bids(&["a", "b"]);
        let entries = vec![
            Some(good[0].clone()),
            None,
            Some(SeatBid::new("", vec![Bid::default()])),
            Some(SeatBid::new("seat", vec![])),
            Some(SeatBid {
                seat: Some("seat".to_string()),
                bid: None,
                ..Default::default()
            }),
            Some(good[1].clone()),
        ];

        let (valid, warnings) = validate_seat_bids(entries);

        assert_eq!(valid, good);
        assert_eq!(
            warnings,
            vec![
                "SeatBid can't be null in stored response",
                "Seat can't be empty in stored response seatBid",
                "There must be at least one bid in stored response seatBid",
                "There must be at least one bid in stored response seatBid",
            ]
        );
    }

    #[test]
    fn inline_seat_bids_take_precedence_over_id() {
        let with_both = directive(Some("id"), Some(vec![]));
        assert_eq!(
            StoredSource::from_directive(&with_both),
            Some(StoredSource::Inline(vec![]))
        );
        assert_eq!(
            StoredSource::from_directive(&directive(Some("id"), None)),
            Some(StoredSource::ById("id".to_string()))
        );
        assert_eq!(StoredSource::from_directive(&directive(None, None)), None);
    }
}
