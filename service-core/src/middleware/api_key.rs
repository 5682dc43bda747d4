//! Shared-secret API key validation.
//!
//! The key may arrive in the `X-API-Key` header or in an `X-API-Key` query
//! parameter. Either source is accepted; the header wins when both match.

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the API key (header names are matched case-insensitively).
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the API key.
pub const API_KEY_QUERY_PARAM: &str = "X-API-Key";

#[derive(Clone)]
pub struct ApiKeyValidator {
    expected: Arc<Secret<String>>,
}

impl ApiKeyValidator {
    pub fn new(expected: Secret<String>) -> Self {
        Self {
            expected: Arc::new(expected),
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        let expected = self.expected.expose_secret().as_bytes();
        let candidate = candidate.as_bytes();

        if expected.is_empty() || expected.len() != candidate.len() {
            return false;
        }

        expected.ct_eq(candidate).into()
    }

    /// Return whichever candidate equals the configured key.
    pub fn validate<'a>(
        &self,
        header: Option<&'a str>,
        query: Option<&'a str>,
    ) -> Result<&'a str, AppError> {
        header
            .filter(|key| self.matches(key))
            .or_else(|| query.filter(|key| self.matches(key)))
            .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("Could not validate credentials")))
    }
}

fn query_key(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find(|(name, _)| name == API_KEY_QUERY_PARAM)
        .map(|(_, value)| value)
}

/// Middleware rejecting requests without a valid API key (403).
pub async fn require_api_key_middleware(
    State(validator): State<ApiKeyValidator>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let query = query_key(&request);

    if let Err(e) = validator.validate(header.as_deref(), query.as_deref()) {
        tracing::warn!(
            path = %request.uri().path(),
            header_present = header.is_some(),
            query_present = query.is_some(),
            "Rejected request with invalid API key"
        );
        return Err(e);
    }

    Ok(next.run(request).await)
}
