//! Common test utilities for ai-service integration tests.
#![allow(dead_code)]

use ai_service::config::AiConfig;
use ai_service::services::providers::mock::MockTextProvider;
use ai_service::services::providers::TextProvider;
use ai_service::startup::{build_router, AppState};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use service_core::config::Config;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const MODEL: &str = "gemini-1.5-flash";

/// Listener settings for a random local port.
pub fn local_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

/// Service config with a provider key set and `overrides` applied.
pub fn test_config(overrides: &[(&str, &str)]) -> AiConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("GEMINI_API_KEY".to_string(), "test-api-key".to_string());
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    AiConfig::from_lookup(local_config(), |key| vars.get(key).cloned())
        .expect("Failed to build test config")
}

pub fn router_with(provider: impl TextProvider + 'static, overrides: &[(&str, &str)]) -> Router {
    build_router(AppState::new(test_config(overrides), Arc::new(provider)))
}

/// Router over an echoing mock that offers the default model.
pub fn default_router() -> Router {
    router_with(MockTextProvider::new([MODEL]), &[])
}

pub fn client_addr(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([192, 168, 0, last_octet], 40000))
}

/// POST a raw body to `uri` as if it came from `addr`.
pub async fn post_raw(app: &Router, uri: &str, body: &str, addr: SocketAddr) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .extension(ConnectInfo(addr))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, &body.to_string(), client_addr(1)).await
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
