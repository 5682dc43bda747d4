use crate::models::ModelRoute;
use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::rate_limit::RateLimitStrategy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_API_KEY: &str = "ai-service-secret-token";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub static_dir: PathBuf,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
}

impl GoogleConfig {
    /// Whether a provider key was supplied at all; says nothing about reachability.
    pub fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Provider model behind the `chatbot` route
    pub chat_model: String,
    /// Provider model behind the `generator` route
    pub generate_model: String,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Deadline for a whole gateway call (model listing plus generation)
    pub timeout_secs: u64,
    pub error_policy: ProviderErrorPolicy,
}

/// How gateway failures are reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorPolicy {
    /// HTTP 200 with the diagnostic text in the normal field plus an `error` kind.
    Payload,
    /// HTTP 5xx with an error body.
    Status,
}

impl FromStr for ProviderErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "payload" => Ok(ProviderErrorPolicy::Payload),
            "status" => Ok(ProviderErrorPolicy::Status),
            other => Err(anyhow::anyhow!("Unknown provider error policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_secs: u64,
    pub strategy: RateLimitStrategy,
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: Secret<String>,
    /// Enforce the API key on `/api/ai/*`. Off unless explicitly enabled.
    pub require_api_key: bool,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl AiConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the service settings from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").as_deref() == Some("prod");
        let vars = Vars { lookup, is_prod };

        Ok(AiConfig {
            common,
            google: GoogleConfig {
                api_key: Secret::new(vars.get_required("GEMINI_API_KEY")?),
                api_base: vars.get("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
            },
            models: ModelConfig {
                chat_model: vars.get("AI_CHAT_MODEL", DEFAULT_MODEL),
                generate_model: vars.get("AI_GENERATE_MODEL", DEFAULT_MODEL),
            },
            provider: ProviderConfig {
                timeout_secs: vars.parse_positive("PROVIDER_TIMEOUT_SECS", 60)?,
                error_policy: vars.parse("PROVIDER_ERROR_POLICY", ProviderErrorPolicy::Payload)?,
            },
            rate_limit: RateLimitConfig {
                requests: vars.parse_positive("RATE_LIMIT_REQUESTS", 10)?,
                window_secs: vars.parse_positive("RATE_LIMIT_WINDOW_SECS", 60)?,
                strategy: vars.parse("RATE_LIMIT_STRATEGY", RateLimitStrategy::SlidingWindow)?,
                trust_forwarded_for: vars.parse("RATE_LIMIT_TRUST_FORWARDED", false)?,
            },
            auth: AuthConfig {
                api_key: Secret::new(vars.get_secret("AUTH_API_KEY", DEFAULT_API_KEY)?),
                require_api_key: vars.parse("AUTH_REQUIRE_API_KEY", false)?,
            },
            static_dir: vars
                .lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")),
            observability: ObservabilityConfig {
                log_level: vars
                    .lookup("LOG_LEVEL")
                    .unwrap_or_else(|| "info".to_string()),
                otlp_endpoint: vars.lookup("OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            },
        })
    }

    /// Get the provider model serving a logical route.
    pub fn model_for_route(&self, route: ModelRoute) -> &str {
        match route {
            ModelRoute::Chatbot => &self.models.chat_model,
            ModelRoute::Generator => &self.models.generate_model,
        }
    }
}

struct Vars<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn get(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }

    /// Setting with no default; blank values count as unset.
    fn get_required(&self, key: &str) -> Result<String, AppError> {
        match self.lookup(key) {
            Some(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        }
    }

    /// Secret with a development default that production must override.
    fn get_secret(&self, key: &str, dev_default: &str) -> Result<String, AppError> {
        match self.lookup(key) {
            Some(val) => Ok(val),
            None if self.is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            ))),
            None => Ok(dev_default.to_string()),
        }
    }

    /// Optional typed setting; an unparsable value is an error, not a fallback.
    fn parse<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.lookup(key) {
            Some(raw) => raw.trim().parse().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
            }),
            None => Ok(default),
        }
    }

    /// Like [`Vars::parse`], but zero is rejected.
    fn parse_positive<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: std::fmt::Display,
    {
        let value = self.parse(key, default)?;
        if value == T::default() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} must be greater than zero",
                key
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn common() -> core_config::Config {
        core_config::Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    fn load(pairs: &[(&str, &str)]) -> Result<AiConfig, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AiConfig::from_lookup(common(), |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_follow_documented_values() {
        let config = load(&[("GEMINI_API_KEY", "k")]).unwrap();

        assert!(config.google.is_configured());
        assert_eq!(config.models.chat_model, "gemini-1.5-flash");
        assert_eq!(config.model_for_route(ModelRoute::Generator), "gemini-1.5-flash");
        assert_eq!(config.provider.timeout_secs, 60);
        assert_eq!(config.provider.error_policy, ProviderErrorPolicy::Payload);
        assert_eq!(config.rate_limit.requests, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.strategy, RateLimitStrategy::SlidingWindow);
        assert!(!config.rate_limit.trust_forwarded_for);
        assert!(!config.auth.require_api_key);
        assert_eq!(config.auth.api_key.expose_secret(), "ai-service-secret-token");
        assert!(config.observability.otlp_endpoint.is_none());
    }

    #[test]
    fn gemini_key_is_required() {
        assert!(matches!(load(&[]), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn blank_gemini_key_is_rejected() {
        assert!(matches!(
            load(&[("GEMINI_API_KEY", "")]),
            Err(AppError::ConfigError(_))
        ));
        assert!(load(&[("GEMINI_API_KEY", "   ")]).is_err());
    }

    #[test]
    fn zero_windows_and_deadlines_are_rejected() {
        for key in ["RATE_LIMIT_WINDOW_SECS", "PROVIDER_TIMEOUT_SECS", "RATE_LIMIT_REQUESTS"] {
            let err = load(&[("GEMINI_API_KEY", "k"), (key, "0")]).unwrap_err();
            assert!(err.to_string().contains(key), "{}", key);
        }
        let config = load(&[("GEMINI_API_KEY", "k"), ("RATE_LIMIT_WINDOW_SECS", "1")]).unwrap();
        assert_eq!(config.rate_limit.window_secs, 1);
    }

    #[test]
    fn production_requires_explicit_auth_key() {
        let err = load(&[("GEMINI_API_KEY", "k"), ("ENVIRONMENT", "prod")]).unwrap_err();
        assert!(err.to_string().contains("AUTH_API_KEY"));
    }

    #[test]
    fn routes_can_use_distinct_models() {
        let config = load(&[
            ("GEMINI_API_KEY", "k"),
            ("AI_CHAT_MODEL", "gemini-2.0-flash"),
            ("AI_GENERATE_MODEL", "gemini-1.5-pro"),
        ])
        .unwrap();

        assert_eq!(config.model_for_route(ModelRoute::Chatbot), "gemini-2.0-flash");
        assert_eq!(config.model_for_route(ModelRoute::Generator), "gemini-1.5-pro");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("GEMINI_API_KEY", "k"), ("RATE_LIMIT_REQUESTS", "ten")]).is_err());
        assert!(load(&[("GEMINI_API_KEY", "k"), ("PROVIDER_ERROR_POLICY", "loud")]).is_err());
        assert!(load(&[("GEMINI_API_KEY", "k"), ("AUTH_REQUIRE_API_KEY", "yes")]).is_err());
    }

    #[test]
    fn explicit_switches_are_honoured() {
        let config = load(&[
            ("GEMINI_API_KEY", "k"),
            ("AUTH_REQUIRE_API_KEY", "true"),
            ("PROVIDER_ERROR_POLICY", "status"),
            ("RATE_LIMIT_STRATEGY", "gcra"),
        ])
        .unwrap();

        assert!(config.auth.require_api_key);
        assert_eq!(config.provider.error_policy, ProviderErrorPolicy::Status);
        assert_eq!(config.rate_limit.strategy, RateLimitStrategy::Gcra);
    }
}
