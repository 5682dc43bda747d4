//! `POST /api/ai/{modelId}`: route a chat or generation prompt to the gateway.

use crate::config::ProviderErrorPolicy;
use crate::models::ModelRoute;
use crate::services::{metrics, GatewayError, GatewayErrorKind};
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use service_core::error::AppError;

pub async fn ai_api_handler(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let data: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body")))?;

    let route = ModelRoute::from_id(&model_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Model '{}' not found", model_id)))?;

    let input = route
        .extract_input(&data)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(route.missing_field_message())))?;

    let model = state.config.model_for_route(route);

    tracing::info!(route = %route, model, input_len = input.len(), "Dispatching AI request");

    match state.gateway.generate(input, model).await {
        Ok(text) => {
            metrics::record_ai_request(route.as_str(), model, "ok");
            Ok(envelope(route, text, None).into_response())
        }
        Err(err) => {
            metrics::record_ai_request(route.as_str(), model, err.kind.as_str());
            match state.config.provider.error_policy {
                ProviderErrorPolicy::Payload => {
                    Ok(envelope(route, err.message, Some(err.kind)).into_response())
                }
                ProviderErrorPolicy::Status => Err(status_error(err)),
            }
        }
    }
}

/// `{<field>: text}`, plus `error: <kind>` when the text is a diagnostic.
fn envelope(route: ModelRoute, text: String, error: Option<GatewayErrorKind>) -> Json<Value> {
    let mut body = Map::new();
    body.insert(route.response_field().to_string(), Value::String(text));
    if let Some(kind) = error {
        body.insert("error".to_string(), Value::String(kind.as_str().to_string()));
    }
    Json(Value::Object(body))
}

fn status_error(err: GatewayError) -> AppError {
    match err.kind {
        GatewayErrorKind::ModelUnavailable => AppError::ServiceUnavailable(err.message),
        GatewayErrorKind::Timeout => AppError::GatewayTimeout(err.message),
        GatewayErrorKind::EmptyResponse | GatewayErrorKind::Provider => {
            AppError::BadGateway(err.message)
        }
    }
}
