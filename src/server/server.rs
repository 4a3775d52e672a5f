//! HTTP server core implementation

use crate::config::{Config, QuotaBackend, ServerConfig};
use crate::core::quota::{MemoryQuotaStore, QuotaEngine, SweeperHandle};
use crate::core::rate_limiter::{IpRateLimiter, RedisWindowCounter, Window};
use crate::server::middleware::{IpAdmission, QuotaGuard};
use crate::server::routes;
use crate::server::state::AppState;
use crate::storage::RedisPool;
use crate::utils::error::{GatewayError, Result};
use actix_web::{App, HttpServer as ActixHttpServer, web};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;

/// HTTP server
pub struct HttpServer {
    /// Server configuration
    config: ServerConfig,
    /// Application state
    state: AppState,
    /// Housekeeping task handle (memory backend only)
    sweeper: Option<SweeperHandle>,
}

impl HttpServer {
    /// Create a new HTTP server, wiring the quota backend selected by
    /// configuration.
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Creating HTTP server");

        let quota_config = config.quota().clone();
        let ip_window = Window::per_minute(config.ip_limit().requests_per_minute);

        let (quota, ip_limiter, redis, sweeper) = match quota_config.backend {
            QuotaBackend::Redis => {
                let pool = RedisPool::new(&config.storage().redis).await?;
                pool.health_check().await?;
                info!("Quota backend: redis");

                let quota = QuotaEngine::with_redis(pool.clone(), &quota_config);
                let ip_counter = RedisWindowCounter::new(
                    pool.clone(),
                    ip_window,
                    format!("{}ip:", quota_config.key_prefix),
                );
                let ip_limiter = IpRateLimiter::with_counter(Arc::new(ip_counter));
                (quota, ip_limiter, Some(pool), None)
            }
            QuotaBackend::Memory => {
                info!("Quota backend: memory");

                let store = Arc::new(MemoryQuotaStore::from_config(&quota_config));
                let sweeper = store.spawn_sweeper(
                    Duration::from_secs(quota_config.sweep_interval_secs),
                    Duration::from_secs(quota_config.idle_eviction_secs),
                );
                let quota = QuotaEngine::new(store, &quota_config);
                let ip_limiter = IpRateLimiter::in_memory(ip_window);
                (quota, ip_limiter, None, Some(sweeper))
            }
        };

        let upstream = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream().timeout))
            .user_agent(config.upstream().user_agent.clone())
            .build()
            .map_err(GatewayError::Upstream)?;

        let state = AppState::new(config.clone(), quota, ip_limiter, upstream, redis);

        Ok(Self {
            config: config.server().clone(),
            state,
            sweeper,
        })
    }

    /// Run the server until shutdown
    pub async fn start(self) -> Result<()> {
        let state = web::Data::new(self.state.clone());
        let max_body_size = self.config.max_body_size;

        info!(
            "Binding HTTP server to {}:{}",
            self.config.host, self.config.port
        );

        let mut server = ActixHttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .app_data(web::PayloadConfig::new(max_body_size))
                .wrap(TracingLogger::default())
                .service(
                    web::scope("/api").wrap(QuotaGuard).service(
                        web::resource("/{tail:.*}").route(web::route().to(routes::relay::forward)),
                    ),
                )
                .service(
                    web::scope("")
                        .wrap(IpAdmission)
                        .route("/health", web::get().to(routes::health::health_check))
                        .route("/stats/global", web::get().to(routes::stats::global))
                        .route("/stats/user/{subject}", web::get().to(routes::stats::user)),
                )
        })
        .bind((self.config.host.as_str(), self.config.port))
        .map_err(GatewayError::Io)?;

        if let Some(workers) = self.config.workers {
            server = server.workers(workers);
        }

        let result = server.run().await.map_err(GatewayError::Io);

        if let Some(sweeper) = self.sweeper {
            sweeper.shutdown().await;
        }
        info!("HTTP server stopped");

        result
    }

    /// Shared state, exposed for embedding and tests
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
