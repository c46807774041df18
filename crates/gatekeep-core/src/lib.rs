//! # Gatekeep Core
//!
//! Shared configuration, validation, and secret handling for Gatekeep.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Identity and password validation
//! - Redacting wrappers for gateway-held secrets

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod validation;

pub use config::{Config, ConfigError};
pub use secrets::{COMMON_SECRET_PATTERNS, GatewaySecret, scrub_secrets};
pub use validation::{ValidationError, validate_identity, validate_password};
