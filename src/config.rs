//! Configuration types.

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Anthropic model used for job-request classification.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Anthropic API base URL.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";

/// Default downstream intake endpoint.
pub const DEFAULT_DOWNSTREAM_URL: &str = "http://127.0.0.1:8000/api/jobs/email-intake";

/// Forwarding is a single attempt bounded by this timeout.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the classification call.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Verdicts must be strictly above this confidence to be forwarded.
pub const CONFIDENCE_THRESHOLD: f64 = 70.0;

/// Maximum accepted webhook body size (10 MiB).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Relay configuration.
///
/// Built once at process start and handed to each component constructor.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Credential for the classification oracle.
    pub api_key: SecretString,
    /// Model name sent with every classification request.
    pub model: String,
    /// Base URL of the Anthropic-compatible API.
    pub llm_base_url: String,
    /// Interface the webhook server binds to.
    pub bind_addr: String,
    /// Port the webhook server listens on.
    pub port: u16,
    /// Downstream intake endpoint receiving forwarded records.
    pub downstream_url: String,
    /// Timeout for the forwarding call.
    pub forward_timeout: Duration,
    /// Timeout for the classification call.
    pub classify_timeout: Duration,
    /// Strict lower bound a verdict's confidence must exceed to forward.
    pub confidence_threshold: f64,
    /// Maximum inbound body size.
    pub max_body_bytes: usize,
}

impl RelayConfig {
    /// Create a config with defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            downstream_url: DEFAULT_DOWNSTREAM_URL.to_string(),
            forward_timeout: FORWARD_TIMEOUT,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;

        let mut config = Self::new(api_key);

        if let Some(model) = lookup("RELAY_MODEL") {
            config.model = model;
        }
        if let Some(url) = lookup("RELAY_LLM_BASE_URL") {
            config.llm_base_url = url;
        }
        if let Some(addr) = lookup("RELAY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            config.port = parse_value("RELAY_PORT", &port)?;
        }
        if let Some(url) = lookup("RELAY_DOWNSTREAM_URL") {
            config.downstream_url = url;
        }
        if let Some(secs) = lookup("RELAY_CLASSIFY_TIMEOUT_SECS") {
            let secs: u64 = parse_value("RELAY_CLASSIFY_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "RELAY_CLASSIFY_TIMEOUT_SECS".to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
            config.classify_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_downstream_url(mut self, url: impl Into<String>) -> Self {
        self.downstream_url = url.into();
        self
    }

    pub fn with_llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm_base_url = url.into();
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }

    /// Socket address the server binds to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "RELAY_BIND_ADDR".to_string(),
                message: format!("{e}"),
            })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{e}"),
    })
}
