//! Quota observability handlers

use crate::server::state::AppState;
use actix_web::{HttpResponse, web};

/// Application-global headroom
pub async fn global(state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    let stats = state.quota.global_stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// One user's consumption in the active windows
pub async fn user(
    subject: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let stats = state.quota.user_stats(&subject.into_inner()).await?;
    Ok(HttpResponse::Ok().json(stats))
}
