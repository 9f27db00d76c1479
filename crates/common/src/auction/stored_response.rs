//! Lookup of stored auction responses by identifier.
//!
//! The resolver only sees [`StoredResponseLookup`]: a lookup never errors,
//! it reports a [`LookupOutcome`] whose failure side is a plain message that
//! ends up in the warning trail.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use error_stack::{Report, ResultExt};

use crate::error::SkippedAuctionError;
use crate::openrtb::SeatBid;
use crate::settings::StoredResponseSettings;

use super::timeout::Deadline;

const STORED_RESPONSE_EXTENSION: &str = "json";

/// Result of resolving a stored response id.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Seat bids ready to be forwarded as-is.
    Resolved(Vec<SeatBid>),
    /// Human-readable reason the lookup failed.
    Failed(String),
}

/// Resolves a stored response id into seat bids.
///
/// Implementations own their retry policy and must return
/// [`LookupOutcome::Failed`] rather than hang once `deadline` has passed.
#[async_trait]
pub trait StoredResponseLookup: Send + Sync {
    async fn resolve(&self, id: &str, deadline: Deadline) -> LookupOutcome;
}

pub(crate) fn not_found_message(id: &str) -> String {
    format!("No stored auction response found for id: {id}")
}

pub(crate) fn parse_failure_message(id: &str) -> String {
    format!("Can't parse stored auction response for id: {id}")
}

pub(crate) fn timeout_message(id: &str) -> String {
    format!("Timed out while fetching stored auction response for id: {id}")
}

/// Stored responses held in memory as raw JSON seat bid arrays.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoredResponses {
    payloads: HashMap<String, String>,
}

impl InMemoryStoredResponses {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from the configured directory and inline payloads.
    /// Inline payloads override directory entries with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured directory cannot be read.
    pub fn from_settings(
        settings: &StoredResponseSettings,
    ) -> Result<Self, Report<SkippedAuctionError>> {
        let mut store = Self::new();
        if let Some(directory) = &settings.directory {
            store.load_directory(directory)?;
        }
        for (id, payload) in &settings.responses {
            store.insert(id.clone(), payload.clone());
        }
        log::info!("Loaded {} stored auction responses", store.len());
        Ok(store)
    }

    pub fn insert(&mut self, id: impl Into<String>, payload: impl Into<String>) {
        self.payloads.insert(id.into(), payload.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Loads every `<id>.json` file of `directory`, keyed by file stem.
    /// Returns the number of payloads loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or one of its files cannot be read.
    pub fn load_directory(
        &mut self,
        directory: &Path,
    ) -> Result<usize, Report<SkippedAuctionError>> {
        let entries = fs::read_dir(directory).change_context(SkippedAuctionError::StoredResponse {
            message: format!("Failed to read directory '{}'", directory.display()),
        })?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry
                .change_context(SkippedAuctionError::StoredResponse {
                    message: format!("Failed to list directory '{}'", directory.display()),
                })?
                .path();

            if path.extension().and_then(|ext| ext.to_str()) != Some(STORED_RESPONSE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                log::warn!("Skipping stored response with non UTF-8 name: {}", path.display());
                continue;
            };

            let payload =
                fs::read_to_string(&path).change_context(SkippedAuctionError::StoredResponse {
                    message: format!("Failed to read '{}'", path.display()),
                })?;
            log::debug!("Loaded stored response '{}' from {}", id, path.display());
            self.payloads.insert(id.to_string(), payload);
            loaded += 1;
        }

        Ok(loaded)
    }
}

#[async_trait]
impl StoredResponseLookup for InMemoryStoredResponses {
    async fn resolve(&self, id: &str, deadline: Deadline) -> LookupOutcome {
        if deadline.is_expired() {
            return LookupOutcome::Failed(timeout_message(id));
        }

        let Some(payload) = self.payloads.get(id) else {
            return LookupOutcome::Failed(not_found_message(id));
        };

        match serde_json::from_str::<Vec<SeatBid>>(payload) {
            Ok(seat_bids) => LookupOutcome::Resolved(seat_bids),
            Err(e) => {
                log::debug!("Stored response '{}' is not a seat bid array: {}", id, e);
                LookupOutcome::Failed(parse_failure_message(id))
            }
        }
    }
}

/// Enforces the caller's deadline around another lookup.
pub struct DeadlineBoundLookup<L> {
    inner: L,
}

impl<L> DeadlineBoundLookup<L> {
    #[must_use]
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: StoredResponseLookup> StoredResponseLookup for DeadlineBoundLookup<L> {
    async fn resolve(&self, id: &str, deadline: Deadline) -> LookupOutcome {
        match tokio::time::timeout(deadline.remaining(), self.inner.resolve(id, deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => LookupOutcome::Failed(timeout_message(id)),
        }
    }
}
