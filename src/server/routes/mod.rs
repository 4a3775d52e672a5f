//! HTTP route handlers
//!
//! - `relay` - authenticated catch-all forwarding to the upstream API
//! - `stats` - quota observability endpoints
//! - `health` - liveness and backend health

pub mod health;
pub mod relay;
pub mod stats;
