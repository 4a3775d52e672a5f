//! Upstream relay handler
//!
//! Admission has already happened in the quota middleware by the time a
//! request lands here; this handler forwards it to the wearable provider,
//! feeds the provider's rate-limit headers back into the quota engine, and
//! returns the upstream response to the caller.

use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::{debug, warn};

/// Request headers forwarded to the upstream verbatim
const FORWARDED_HEADERS: [&str; 4] = [
    "authorization",
    "accept",
    "accept-language",
    "content-type",
];

/// Forward one request to the upstream API
pub async fn forward(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let tail = req.match_info().query("tail");
    let base = state.config.gateway.upstream.base_url.trim_end_matches('/');
    let mut url = format!("{}/{}", base, tail);
    if !req.query_string().is_empty() {
        url = format!("{}?{}", url, req.query_string());
    }

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|_| GatewayError::BadRequest(format!("Unsupported method: {}", req.method())))?;

    debug!(%method, url = %url, "relaying request upstream");

    let mut upstream = state.upstream.request(method, url);
    for name in FORWARDED_HEADERS {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            upstream = upstream.header(name, value);
        }
    }
    if !body.is_empty() {
        upstream = upstream.body(body.to_vec());
    }

    let response = upstream.send().await.map_err(GatewayError::Upstream)?;

    // The upstream's own enforcement is authoritative; resynchronize the
    // global counters before replying. A failed sync never fails the relay.
    if let Err(e) = state.quota.update_from_headers(response.headers()).await {
        warn!("Failed to reconcile quota from upstream headers: {}", e);
    }

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let bytes = response.bytes().await.map_err(GatewayError::Upstream)?;

    let mut builder = HttpResponse::build(status);
    if let Some(content_type) = content_type {
        builder.insert_header((actix_web::http::header::CONTENT_TYPE, content_type));
    }
    Ok(builder.body(bytes))
}
