//! Stored auction response handling.
//!
//! This crate decides, for a single auction request, whether the real
//! auction can be skipped in favor of a stored response, and builds the
//! resulting bid response together with its warning trail.
//!
//! # Modules
//!
//! - [`auction`]: Bypass resolver, auction context, stored response lookups
//! - [`constants`]: Warning texts and other fixed values
//! - [`error`]: Error types and error handling utilities
//! - [`openrtb`]: OpenRTB request/response subset
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and fixtures

pub mod auction;
pub mod constants;
pub mod error;
pub mod openrtb;
pub mod settings;
