//! Quota enforcement middleware
//!
//! Runs `check_and_increment` for the calling user before a relayed request
//! reaches the upstream. A denial becomes a 429 carrying `Retry-After` and
//! `X-RateLimit-Reason`; a quota-backend failure becomes a 503 (fail
//! closed - an unaccounted admission could blow the shared upstream quota).

use crate::core::quota::QuotaDecision;
use crate::server::state::AppState;
use crate::utils::error::{ErrorDetail, ErrorResponse};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header::HeaderValue;
use actix_web::{HttpMessage, HttpResponse, ResponseError, web};
use futures::future::{Ready, ready};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

/// Per-user principal resolved by the auth layer.
///
/// The authentication system inserts this extension after validating the
/// caller's token; when it is absent the middleware falls back to a hash of
/// the presented credential, and finally to the peer address.
#[derive(Debug, Clone)]
pub struct SubjectKey(pub String);

/// 429 response for an exhausted quota window
#[derive(Debug)]
pub struct QuotaDenied(pub QuotaDecision);

impl fmt::Display for QuotaDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = self.0.reason.map(|r| r.as_str()).unwrap_or("unknown");
        write!(f, "Rate limit exceeded: {}", reason)
    }
}

impl ResponseError for QuotaDenied {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        let retry_after = self.0.retry_after().as_secs().max(1);
        let reason = self.0.reason.map(|r| r.as_str()).unwrap_or("unknown");

        HttpResponse::TooManyRequests()
            .insert_header((actix_web::http::header::RETRY_AFTER, retry_after.to_string()))
            .insert_header(("x-ratelimit-reason", reason))
            .json(ErrorResponse {
                error: ErrorDetail {
                    code: "QUOTA_EXCEEDED".to_string(),
                    message: format!(
                        "Rate limit exceeded for the {} window. Retry after {} seconds.",
                        reason, retry_after
                    ),
                    timestamp: chrono::Utc::now().timestamp(),
                    request_id: None,
                },
            })
    }
}

/// Resolve the quota subject for a request
fn resolve_subject(req: &ServiceRequest) -> String {
    if let Some(key) = req.extensions().get::<SubjectKey>() {
        return key.0.clone();
    }

    // Hash the presented credential rather than keying on the raw secret.
    if let Some(credential) = req
        .headers()
        .get("authorization")
        .or_else(|| req.headers().get("x-api-key"))
        .and_then(|h| h.to_str().ok())
    {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        credential.hash(&mut hasher);
        return format!("key:{:x}", hasher.finish());
    }

    let ip = req
        .connection_info()
        .peer_addr()
        .unwrap_or("unknown")
        .to_string();
    format!("ip:{}", ip)
}

/// Quota enforcement middleware for Actix-web
pub struct QuotaGuard;

impl<S, B> Transform<S, ServiceRequest> for QuotaGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = QuotaGuardService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(QuotaGuardService { service }))
    }
}

/// Service implementation for the quota middleware
pub struct QuotaGuardService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for QuotaGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let subject = resolve_subject(&req);
        req.extensions_mut().insert(SubjectKey(subject.clone()));

        let fut = self.service.call(req);
        Box::pin(async move {
            let state = state.ok_or_else(|| {
                actix_web::error::ErrorInternalServerError("App state not found")
            })?;

            // A backend error propagates as 503 via its ResponseError impl.
            let decision = state.quota.check_and_increment(&subject).await?;

            if !decision.allowed {
                warn!(
                    subject = %subject,
                    reason = decision.reason.map(|r| r.as_str()).unwrap_or("unknown"),
                    "request denied by quota engine"
                );
                return Err(QuotaDenied(decision).into());
            }

            let mut res = fut.await?;
            let minute_limit = state.quota.windows().user_minute.limit;
            let headers = res.headers_mut();
            headers.insert(
                actix_web::http::header::HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from_str(&minute_limit.to_string())
                    .unwrap_or(HeaderValue::from_static("0")),
            );
            headers.insert(
                actix_web::http::header::HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_str(&decision.minute_remaining.to_string())
                    .unwrap_or(HeaderValue::from_static("0")),
            );
            let reset_secs = (decision.minute_reset_at - chrono::Utc::now())
                .num_seconds()
                .max(0);
            headers.insert(
                actix_web::http::header::HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from_str(&reset_secs.to_string())
                    .unwrap_or(HeaderValue::from_static("0")),
            );

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::quota::{QuotaExceededReason, QuotaWindows};
    use crate::config::QuotaConfig;
    use actix_web::http::StatusCode;

    #[test]
    fn test_denied_response_shape() {
        let windows = QuotaWindows::from_config(&QuotaConfig::default());
        let decision = QuotaDecision::denied(QuotaExceededReason::GlobalMinute, 12, 800, &windows);
        let denied = QuotaDenied(decision);

        let response = denied.error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("x-ratelimit-reason").unwrap(),
            "global-minute"
        );
        assert!(response.headers().get("retry-after").is_some());
    }
}
