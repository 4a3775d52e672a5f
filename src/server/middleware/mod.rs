//! HTTP middleware implementations
//!
//! - `quota` - per-user quota enforcement for relayed routes
//! - `ip_limit` - per-IP admission for unauthenticated routes

pub mod ip_limit;
pub mod quota;

pub use ip_limit::IpAdmission;
pub use quota::{QuotaGuard, SubjectKey};
