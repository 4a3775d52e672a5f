//! HTTP-layer admission tests
//!
//! Drives the middleware stack through actix's test harness: quota denials
//! become 429s with the documented headers, admissions pass through with
//! rate-limit headers attached, and the IP limiter guards the
//! unauthenticated routes.

use actix_web::body::{BoxBody, MessageBody, to_bytes};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{App, Error, HttpResponse, test, web};
use fitrelay_rs::config::{Config, IpLimitConfig, QuotaConfig};
use fitrelay_rs::core::quota::QuotaEngine;
use fitrelay_rs::core::rate_limiter::{IpRateLimiter, Window};
use fitrelay_rs::server::middleware::{IpAdmission, QuotaGuard};
use fitrelay_rs::server::routes;
use fitrelay_rs::server::state::AppState;

fn test_state(quota: QuotaConfig, ip_limit: IpLimitConfig) -> AppState {
    let mut config = Config::default();
    config.gateway.quota = quota.clone();
    config.gateway.ip_limit = ip_limit.clone();

    AppState::new(
        config,
        QuotaEngine::in_memory(&quota),
        IpRateLimiter::in_memory(Window::per_minute(ip_limit.requests_per_minute)),
        reqwest::Client::new(),
        None,
    )
}

async fn echo() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Call the service, normalizing middleware errors into the responses the
/// HTTP dispatcher would produce for them.
async fn call<S, B, R>(app: &S, req: R) -> HttpResponse<BoxBody>
where
    S: Service<R, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody + 'static,
{
    match app.call(req).await {
        Ok(res) => res.map_into_boxed_body().into_parts().1,
        Err(err) => HttpResponse::from_error(err),
    }
}

async fn body_json(res: HttpResponse<BoxBody>) -> serde_json::Value {
    let bytes = to_bytes(res.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[actix_web::test]
async fn admitted_request_passes_with_rate_limit_headers() {
    let state = test_state(QuotaConfig::default(), IpLimitConfig::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state)).service(
            web::scope("/api")
                .wrap(QuotaGuard)
                .route("/echo", web::get().to(echo)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/echo")
        .insert_header(("x-api-key", "alice-token"))
        .to_request();
    let res = call(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "20");
    assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "19");
    assert!(res.headers().get("x-ratelimit-reset").is_some());
}

#[actix_web::test]
async fn exhausted_user_gets_429_with_reason() {
    let quota = QuotaConfig {
        per_user_minute_limit: 2,
        ..Default::default()
    };
    let state = test_state(quota, IpLimitConfig::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state)).service(
            web::scope("/api")
                .wrap(QuotaGuard)
                .route("/echo", web::get().to(echo)),
        ),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/echo")
            .insert_header(("x-api-key", "alice-token"))
            .to_request();
        assert_eq!(call(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/api/echo")
        .insert_header(("x-api-key", "alice-token"))
        .to_request();
    let res = call(&app, req).await;

    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        res.headers().get("x-ratelimit-reason").unwrap(),
        "user-minute"
    );
    assert!(res.headers().get("retry-after").is_some());

    let body = body_json(res).await;
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
}

#[actix_web::test]
async fn distinct_users_do_not_share_per_user_quota() {
    let quota = QuotaConfig {
        per_user_minute_limit: 1,
        ..Default::default()
    };
    let state = test_state(quota, IpLimitConfig::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state)).service(
            web::scope("/api")
                .wrap(QuotaGuard)
                .route("/echo", web::get().to(echo)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/echo")
        .insert_header(("x-api-key", "alice-token"))
        .to_request();
    assert_eq!(call(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/echo")
        .insert_header(("x-api-key", "alice-token"))
        .to_request();
    assert_eq!(
        call(&app, req).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Bob is unaffected by Alice's exhaustion.
    let req = test::TestRequest::get()
        .uri("/api/echo")
        .insert_header(("x-api-key", "bob-token"))
        .to_request();
    assert_eq!(call(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn health_and_stats_are_served() {
    let state = test_state(QuotaConfig::default(), IpLimitConfig::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state)).service(
            web::scope("")
                .wrap(IpAdmission)
                .route("/health", web::get().to(routes::health::health_check))
                .route("/stats/global", web::get().to(routes::stats::global))
                .route("/stats/user/{subject}", web::get().to(routes::stats::user)),
        ),
    )
    .await;

    let res = call(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["quota_backend"], "memory");

    let res = call(
        &app,
        test::TestRequest::get().uri("/stats/global").to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["minute_remaining"], 95);
    assert_eq!(body["day_remaining"], 9950);

    let res = call(
        &app,
        test::TestRequest::get()
            .uri("/stats/user/alice")
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["minute_used"], 0);
    assert_eq!(body["day_used"], 0);
}

#[actix_web::test]
async fn ip_limiter_throttles_unauthenticated_callers() {
    let ip_limit = IpLimitConfig {
        enabled: true,
        requests_per_minute: 2,
    };
    let state = test_state(QuotaConfig::default(), ip_limit);
    let app = test::init_service(
        App::new().app_data(web::Data::new(state)).service(
            web::scope("")
                .wrap(IpAdmission)
                .route("/health", web::get().to(routes::health::health_check)),
        ),
    )
    .await;

    let peer = std::net::SocketAddr::from(([10, 0, 0, 1], 40000));
    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/health")
            .peer_addr(peer)
            .to_request();
        assert_eq!(call(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/health")
        .peer_addr(peer)
        .to_request();
    let res = call(&app, req).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().get("retry-after").is_some());

    let body = body_json(res).await;
    assert_eq!(body["error"]["code"], "IP_RATE_LIMITED");
}

#[actix_web::test]
async fn disabled_ip_limiter_admits_everything() {
    let ip_limit = IpLimitConfig {
        enabled: false,
        requests_per_minute: 1,
    };
    let state = test_state(QuotaConfig::default(), ip_limit);
    let app = test::init_service(
        App::new().app_data(web::Data::new(state)).service(
            web::scope("")
                .wrap(IpAdmission)
                .route("/health", web::get().to(routes::health::health_check)),
        ),
    )
    .await;

    for _ in 0..5 {
        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(call(&app, req).await.status(), StatusCode::OK);
    }
}
