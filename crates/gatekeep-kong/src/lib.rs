//! # Gatekeep Kong
//!
//! Typed client for the Kong admin REST API: consumers, JWT credentials
//! and key-auth credentials.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod kong;
pub mod traits;

pub use kong::{API_KEY_LENGTH, KongAdminClient, KongConfig, generate_api_key};
pub use traits::{Consumer, GatewayAdmin, GatewayError, JwtCredential, KeyAuthCredential};
