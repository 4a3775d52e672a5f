//! Shared utilities
//!
//! Error types and logging setup used across the relay.

pub mod error;
pub mod logging;

pub use error::{GatewayError, Result};
