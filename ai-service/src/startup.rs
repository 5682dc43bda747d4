//! Application startup and lifecycle management.

use crate::config::AiConfig;
use crate::handlers::{
    ai::ai_api_handler,
    health::health_check,
    metrics::metrics,
    pages::{page_routes, root_redirect},
};
use crate::services::metrics::http_metrics_middleware;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::TextProvider;
use crate::services::AiGateway;
use axum::{
    body::Body,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    api_key::{require_api_key_middleware, ApiKeyValidator},
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, spawn_eviction_task, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AiConfig>,
    pub gateway: AiGateway,
    pub rate_limit: IpRateLimit,
    /// Present only when API key enforcement is switched on.
    pub api_key: Option<ApiKeyValidator>,
}

impl AppState {
    pub fn new(config: AiConfig, provider: Arc<dyn TextProvider>) -> Self {
        let gateway = AiGateway::new(
            provider,
            Duration::from_secs(config.provider.timeout_secs),
        );

        let rate_limit = IpRateLimit {
            limiter: create_ip_rate_limiter(
                config.rate_limit.strategy,
                config.rate_limit.requests,
                Duration::from_secs(config.rate_limit.window_secs),
            ),
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
        };

        let api_key = config
            .auth
            .require_api_key
            .then(|| ApiKeyValidator::new(config.auth.api_key.clone()));

        Self {
            config: Arc::new(config),
            gateway,
            rate_limit,
            api_key,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Credential check (when enabled) runs before the limiter.
    let mut ai_routes = Router::new()
        .route("/api/ai/:model_id", post(ai_api_handler))
        .route_layer(from_fn_with_state(
            state.rate_limit.clone(),
            ip_rate_limit_middleware,
        ));
    if let Some(validator) = state.api_key.clone() {
        ai_routes = ai_routes.route_layer(from_fn_with_state(
            validator,
            require_api_key_middleware,
        ));
    }

    Router::new()
        .route("/", get(root_redirect))
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(page_routes(&state.config.static_dir))
        .merge(ai_routes)
        .layer(from_fn(http_metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the Gemini provider.
    pub async fn build(config: AiConfig) -> Result<Self, AppError> {
        let gemini_config = GeminiConfig {
            api_key: config.google.api_key.clone(),
            api_base: config.google.api_base.clone(),
        };
        let provider = GeminiTextProvider::new(gemini_config).map_err(|e| {
            tracing::error!("Failed to initialize Gemini provider: {}", e);
            AppError::ConfigError(anyhow::Error::new(e))
        })?;

        tracing::info!(
            chat_model = %config.models.chat_model,
            generate_model = %config.models.generate_model,
            "Initialized Gemini text provider"
        );

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application around an existing provider.
    pub async fn build_with_provider(
        config: AiConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        // Port 0 binds a random port for testing
        let addr = config.common.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        if !config.auth.require_api_key {
            tracing::warn!("API key enforcement is disabled for /api/ai/*");
        }

        tracing::info!(
            port,
            rate_limit_requests = config.rate_limit.requests,
            rate_limit_window_secs = config.rate_limit.window_secs,
            strategy = ?config.rate_limit.strategy,
            "AI service listening"
        );

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, provider),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let eviction = spawn_eviction_task(
            self.state.rate_limit.limiter.clone(),
            Duration::from_secs(self.state.config.rate_limit.window_secs),
        );

        let router = build_router(self.state);
        let result = axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        eviction.abort();

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result
    }
}
