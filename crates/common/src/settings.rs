//! Service settings loaded from TOML with environment overrides.
//!
//! Environment variables prefixed with `SKIPPED_AUCTION__` override values
//! from the TOML source, using `__` as the section separator. For example
//! `SKIPPED_AUCTION__AUCTION__DEFAULT_TIMEOUT_MS=500` overrides
//! `auction.default_timeout_ms`.

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::ENV_PREFIX;
use crate::error::SkippedAuctionError;

/// Timing and currency defaults applied to bypassed auctions.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AuctionSettings {
    /// Budget used when the request carries no `tmax`.
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub default_timeout_ms: u64,

    /// Upper bound applied to a request's `tmax` when deriving the deadline.
    #[serde(default = "default_max_timeout_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub max_timeout_ms: u64,

    /// Currency reported when the request declares none.
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,
}

impl Default for AuctionSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            default_currency: default_currency(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_max_timeout_ms() -> u64 {
    5000
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Sources of stored auction responses resolvable by id.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct StoredResponseSettings {
    /// Directory holding `<id>.json` payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Inline payloads keyed by stored response id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub responses: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub auction: AuctionSettings,

    #[serde(default)]
    #[validate(nested)]
    pub stored_responses: StoredResponseSettings,
}

impl Settings {
    /// Parses settings from a TOML string, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TOML is malformed or the merged
    /// values do not deserialize into [`Settings`].
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<SkippedAuctionError>> {
        let environment = Environment::default()
            .prefix(ENV_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(SkippedAuctionError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        config
            .try_deserialize()
            .change_context(SkippedAuctionError::Configuration {
                message: "Failed to deserialize configuration".to_string(),
            })
    }

    /// Parses settings and runs validation on the result.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if parsing or validation fails.
    pub fn from_toml_validated(toml_str: &str) -> Result<Self, Report<SkippedAuctionError>> {
        let settings = Self::from_toml(toml_str)?;
        settings
            .validate()
            .change_context(SkippedAuctionError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        if settings.auction.default_timeout_ms > settings.auction.max_timeout_ms {
            return Err(Report::new(SkippedAuctionError::Configuration {
                message: format!(
                    "auction.default_timeout_ms ({}) must not exceed auction.max_timeout_ms ({})",
                    settings.auction.default_timeout_ms, settings.auction.max_timeout_ms
                ),
            }));
        }

        Ok(settings)
    }

    /// Serializes the effective settings (after environment overrides).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if serialization fails.
    pub fn to_canonical_toml(&self) -> Result<String, Report<SkippedAuctionError>> {
        toml::to_string(self).change_context(SkippedAuctionError::Configuration {
            message: "Failed to serialize settings".to_string(),
        })
    }
}
