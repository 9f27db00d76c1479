//! Configuration commands.
//!
//! Configuration is loaded from TOML files and merged with environment variables
//! prefixed with `SKIPPED_AUCTION__`. For example,
//! `SKIPPED_AUCTION__AUCTION__DEFAULT_TIMEOUT_MS` will override
//! `auction.default_timeout_ms` in the TOML file.

use std::fs;
use std::path::Path;

use skipped_auction_common::settings::Settings;

use crate::error::CliError;

/// Load, merge with environment variables and validate settings from a TOML file.
pub(crate) fn load_settings(file: &Path, verbose: bool) -> Result<Settings, CliError> {
    let content = fs::read_to_string(file)?;

    if verbose {
        log::info!("Loading config from: {}", file.display());
    }

    Settings::from_toml_validated(&content)
        .map_err(|e| CliError::Config(format!("Failed to load config: {:?}", e)))
}

/// Validate a configuration file and print the effective settings.
pub fn validate(file: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(file, verbose)?;

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!(
        "  Default timeout: {}ms (max {}ms)",
        settings.auction.default_timeout_ms, settings.auction.max_timeout_ms
    );
    println!("  Default currency: {}", settings.auction.default_currency);

    if verbose {
        let merged_toml = settings
            .to_canonical_toml()
            .map_err(|e| CliError::Config(format!("Failed to serialize merged config: {e:?}")))?;
        let value: toml::Value = toml::from_str(&merged_toml)?;
        if let Some(table) = value.as_table() {
            println!("\nSections found:");
            for key in table.keys() {
                println!("  - [{}]", key);
            }
        }
    }

    Ok(())
}
