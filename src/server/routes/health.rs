//! Health check handler

use crate::server::state::AppState;
use actix_web::{HttpResponse, web};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    quota_backend: &'static str,
    timestamp: i64,
}

/// Liveness plus quota-backend health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let quota_backend = match &state.redis {
        Some(pool) => match pool.health_check().await {
            Ok(()) => "redis:connected",
            Err(_) => "redis:unavailable",
        },
        None => "memory",
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        quota_backend,
        timestamp: chrono::Utc::now().timestamp(),
    })
}
