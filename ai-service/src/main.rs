use ai_service::config::AiConfig;
use ai_service::services::metrics::init_metrics;
use ai_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = AiConfig::load();

    // Tracing settings come from the config when it loads; defaults otherwise,
    // so the load failure itself gets logged.
    let (log_level, otlp_endpoint) = match &config {
        Ok(c) => (
            c.observability.log_level.clone(),
            c.observability.otlp_endpoint.clone(),
        ),
        Err(_) => ("info".to_string(), None),
    };
    init_tracing("ai-service", &log_level, otlp_endpoint.as_deref());

    let config = config.map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        std::io::Error::other(format!("Metrics error: {}", e))
    })?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
