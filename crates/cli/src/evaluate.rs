//! `sacli evaluate`: run the stored response bypass for one request file.

use std::fs;
use std::path::{Path, PathBuf};

use skipped_auction_common::auction::{build_resolver, AuctionContext};
use skipped_auction_common::error::{BypassError, SkippedAuctionError};
use skipped_auction_common::openrtb::{BidRequest, BidResponse};
use skipped_auction_common::settings::Settings;

use crate::config::load_settings;
use crate::error::CliError;

/// What happened to the request.
#[derive(Debug)]
pub enum EvaluateOutcome {
    /// The auction was skipped; carries the synthesized response.
    Skipped(BidResponse),
    /// The request is not eligible; the real auction would run.
    NotSkipped(BypassError),
}

/// Options of the `evaluate` command.
pub struct EvaluateOptions {
    pub request: PathBuf,
    pub config: Option<PathBuf>,
    pub stored_responses: Option<PathBuf>,
    pub rejected: bool,
}

/// Evaluate a request file and print the outcome.
pub fn evaluate(options: &EvaluateOptions, verbose: bool) -> Result<(), CliError> {
    match run(options, verbose)? {
        EvaluateOutcome::Skipped(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        EvaluateOutcome::NotSkipped(reason) => {
            println!("auction not skipped: {}", reason);
        }
    }
    Ok(())
}

/// Load settings, the request and the stored responses, then run the resolver.
pub fn run(options: &EvaluateOptions, verbose: bool) -> Result<EvaluateOutcome, CliError> {
    let mut settings = match &options.config {
        Some(file) => load_settings(file, verbose)?,
        None => Settings::from_toml_validated("")
            .map_err(|e| CliError::Config(format!("Failed to load default config: {:?}", e)))?,
    };
    if let Some(directory) = &options.stored_responses {
        settings.stored_responses.directory = Some(directory.clone());
    }

    let request = read_request(&options.request)?;
    let resolver = build_resolver(&settings)
        .map_err(|e| CliError::StoredResponses(format!("{:?}", e)))?;

    let mut context = AuctionContext::from_request(request, &settings.auction);
    if options.rejected {
        context = context.rejected();
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    match runtime.block_on(resolver.evaluate(&mut context)) {
        Ok(response) => Ok(EvaluateOutcome::Skipped(response.clone())),
        Err(report) => {
            log::info!("Falling back to the real auction: {}", report);
            Ok(EvaluateOutcome::NotSkipped(*report.current_context()))
        }
    }
}

fn read_request(path: &Path) -> Result<BidRequest, CliError> {
    let content = fs::read_to_string(path)?;
    BidRequest::from_json(&content).map_err(|report| match report.current_context() {
        SkippedAuctionError::InvalidRequest { message } => {
            CliError::Request(format!("{} ({})", message, path.display()))
        }
        _ => CliError::Json(format!("{:?}", report)),
    })
}
