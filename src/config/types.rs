//! Configuration types for TurnForge

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Per-provider credentials and endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Default selection and generation parameters
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Test/mock mode override
    #[serde(default)]
    pub test_mode: TestModeConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Credentials and endpoints for each supported provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Gemini (Google AI) credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<ProviderConfig>,
    /// OpenAI-compatible credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderConfig>,
}

/// A single provider's connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// API key; empty or absent means the provider is unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override (proxies, self-hosted gateways)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    /// The configured API key, treating empty strings as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Default provider/model selection and generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default provider id
    pub provider: String,
    /// Default model for the default provider
    pub model: String,
    /// Sampling temperature for narration
    pub temperature: f32,
    /// Requested output-token cap before the budget ceiling applies
    pub max_output_tokens: u64,
    /// Per-call timeout in seconds for outbound provider requests
    pub request_timeout_secs: u64,
    /// Whether a context-too-large failure may retry once on a
    /// larger-context model
    pub allow_context_fallback: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.8,
            max_output_tokens: 8_192,
            request_timeout_secs: 90,
            allow_context_fallback: true,
        }
    }
}

/// Test/mock mode: forces a fixed selection regardless of user preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestModeConfig {
    /// Whether test mode is active
    pub enabled: bool,
    /// Provider id forced while enabled
    pub provider: String,
    /// Model name forced while enabled
    pub model: String,
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "mock".to_string(),
            model: "mock-model".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable text
    Compact,
    /// Structured JSON lines for log aggregators
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
