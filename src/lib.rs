//! # fitrelay-rs
//!
//! A fitness-wearable API relay: many end users share one upstream
//! application, and the upstream enforces composite application-wide quotas
//! (100 requests/minute, 10000 requests/day). The gateway admits each
//! outbound request through a four-counter quota engine - per-user and
//! application-global, over minute and day windows - so no single user can
//! exhaust the shared budget, and reconciles its accounting against the
//! rate-limit headers the upstream returns.
//!
//! ## Admission flow
//!
//! ```text
//! request -> QuotaGuard.check_and_increment(user)
//!            |- denied  -> 429 + Retry-After + X-RateLimit-Reason
//!            |- error   -> 503 (fail closed)
//!            '- admitted -> relay upstream -> update_from_headers -> reply
//! ```
//!
//! ## Embedding the engine
//!
//! ```rust,no_run
//! use fitrelay_rs::config::QuotaConfig;
//! use fitrelay_rs::core::quota::QuotaEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = QuotaEngine::in_memory(&QuotaConfig::default());
//!
//!     let decision = engine.check_and_increment("user-123").await?;
//!     if decision.allowed {
//!         // proceed upstream, then feed response headers back:
//!         // engine.update_from_headers(response.headers()).await?;
//!     } else {
//!         println!(
//!             "denied ({}), retry in {:?}",
//!             decision.reason.unwrap(),
//!             decision.retry_after()
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Two interchangeable counter backends exist behind one contract: in-process
//! token buckets for a single gateway instance, and Redis sorted-set counters
//! evaluated by an atomic server-side script when several instances share the
//! application quota.

pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod utils;

// Re-export the main public types
pub use config::Config;
pub use core::quota::{GlobalStats, QuotaDecision, QuotaEngine, QuotaExceededReason, UserStats};
pub use core::rate_limiter::{IpRateLimiter, Window, WindowCounter};
pub use utils::error::{GatewayError, Result};

use tracing::info;

/// A minimal relay gateway instance
pub struct Gateway {
    server: server::HttpServer,
}

impl Gateway {
    /// Create a new gateway instance
    pub async fn new(config: Config) -> Result<Self> {
        info!("Creating new gateway instance");

        let server = server::HttpServer::new(&config).await?;
        Ok(Self { server })
    }

    /// Run until shutdown
    pub async fn run(self) -> Result<()> {
        self.server.start().await
    }
}
