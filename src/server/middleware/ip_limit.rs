//! IP admission middleware
//!
//! Guards unauthenticated routes (health, stats) with the single-window
//! per-IP limiter. One counter, no rollback.

use crate::server::state::AppState;
use crate::utils::error::{ErrorDetail, ErrorResponse};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{HttpResponse, ResponseError, web};
use futures::future::{Ready, ready};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// 429 response for an over-limit caller IP
#[derive(Debug)]
pub struct IpLimited {
    /// Seconds until the caller's window has room again
    pub retry_after: u64,
}

impl fmt::Display for IpLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Too many requests from this address")
    }
}

impl ResponseError for IpLimited {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .insert_header((
                actix_web::http::header::RETRY_AFTER,
                self.retry_after.to_string(),
            ))
            .json(ErrorResponse {
                error: ErrorDetail {
                    code: "IP_RATE_LIMITED".to_string(),
                    message: format!(
                        "Too many requests from this address. Retry after {} seconds.",
                        self.retry_after
                    ),
                    timestamp: chrono::Utc::now().timestamp(),
                    request_id: None,
                },
            })
    }
}

/// IP admission middleware for Actix-web
pub struct IpAdmission;

impl<S, B> Transform<S, ServiceRequest> for IpAdmission
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = IpAdmissionService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IpAdmissionService { service }))
    }
}

/// Service implementation for the IP admission middleware
pub struct IpAdmissionService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for IpAdmissionService<S>
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
        let addr = req
            .connection_info()
            .peer_addr()
            .unwrap_or("unknown")
            .to_string();

        let fut = self.service.call(req);
        Box::pin(async move {
            let state = state.ok_or_else(|| {
                actix_web::error::ErrorInternalServerError("App state not found")
            })?;

            if !state.config.gateway.ip_limit.enabled {
                return fut.await;
            }

            if !state.ip_limiter.allow(&addr).await? {
                debug!(addr = %addr, "IP admission denied");
                return Err(IpLimited {
                    retry_after: state.ip_limiter.window().length.as_secs().max(1),
                }
                .into());
            }

            fut.await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_limited_response_shape() {
        let limited = IpLimited { retry_after: 60 };
        let response = limited.error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");
    }
}
