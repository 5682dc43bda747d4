use crate::startup::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// Service status plus the provider's model catalog.
///
/// Always 200: an unreachable provider only empties `available_models`, and
/// `gemini_ready` reports whether a key is configured, not reachability.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let available_models = match state.gateway.available_models().await {
        Ok(models) => models,
        Err(e) => {
            tracing::error!(
                provider = state.gateway.provider_name(),
                error = %e,
                "Health check failed to list models"
            );
            Vec::new()
        }
    };

    Json(json!({
        "status": "healthy",
        "service": "AI Service",
        "gemini_ready": state.config.google.is_configured(),
        "available_models": available_models,
    }))
}
