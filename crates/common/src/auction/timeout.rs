//! Per-request time budget and the deadline handed to stored response lookups.

use std::time::{Duration, Instant};

use crate::openrtb::BidRequest;
use crate::settings::AuctionSettings;

/// Point in time after which a lookup must give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self::at(Instant::now() + budget)
    }

    #[must_use]
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Time budget of one auction request, anchored at the moment it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutContext {
    start: Instant,
    tmax_ms: u64,
}

impl TimeoutContext {
    #[must_use]
    pub fn new(start: Instant, tmax_ms: u64) -> Self {
        Self { start, tmax_ms }
    }

    #[must_use]
    pub fn starting_now(tmax_ms: u64) -> Self {
        Self::new(Instant::now(), tmax_ms)
    }

    /// Derives the budget from the request's `tmax`, falling back to the
    /// configured default and clamping to the configured maximum.
    #[must_use]
    pub fn for_request(request: &BidRequest, settings: &AuctionSettings) -> Self {
        let tmax_ms = request
            .tmax
            .filter(|tmax| *tmax > 0)
            .unwrap_or(settings.default_timeout_ms)
            .min(settings.max_timeout_ms);
        Self::starting_now(tmax_ms)
    }

    /// Effective budget in milliseconds.
    #[must_use]
    pub fn tmax_ms(&self) -> u64 {
        self.tmax_ms
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        Deadline::at(self.start + Duration::from_millis(self.tmax_ms))
    }

    /// Budget left for the rest of the request.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline().remaining()
    }
}
