//! Configuration management for TurnForge
//!
//! Configuration is loaded from `~/.turnforge/config.json` with environment
//! variable overrides (`TURNFORGE_*`). Validation runs at load time so that
//! an unresolvable model or missing default credential fails before the
//! first turn, never during one.

mod types;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{Result, TurnError};
use crate::models::profile_for;
use crate::selection::provider_spec;

impl Config {
    /// Returns the TurnForge configuration directory path (~/.turnforge)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".turnforge")
    }

    /// Returns the path to the config file (~/.turnforge/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        // .env is optional; ignore absence.
        let _ = dotenvy::dotenv();
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TURNFORGE_DEFAULTS_PROVIDER") {
            self.defaults.provider = val;
        }
        if let Ok(val) = std::env::var("TURNFORGE_DEFAULTS_MODEL") {
            self.defaults.model = val;
        }
        if let Ok(val) = std::env::var("TURNFORGE_DEFAULTS_MAX_OUTPUT_TOKENS") {
            if let Ok(v) = val.parse() {
                self.defaults.max_output_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("TURNFORGE_DEFAULTS_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                self.defaults.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("TURNFORGE_DEFAULTS_REQUEST_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.defaults.request_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("TURNFORGE_TEST_MODE") {
            self.test_mode.enabled = matches!(val.as_str(), "1" | "true" | "yes");
        }

        if let Ok(val) = std::env::var("TURNFORGE_PROVIDERS_GEMINI_API_KEY") {
            let provider = self
                .providers
                .gemini
                .get_or_insert_with(ProviderConfig::default);
            provider.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("TURNFORGE_PROVIDERS_OPENAI_API_KEY") {
            let provider = self
                .providers
                .openai
                .get_or_insert_with(ProviderConfig::default);
            provider.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("TURNFORGE_PROVIDERS_GEMINI_API_BASE") {
            let provider = self
                .providers
                .gemini
                .get_or_insert_with(ProviderConfig::default);
            provider.api_base = Some(val);
        }
        if let Ok(val) = std::env::var("TURNFORGE_PROVIDERS_OPENAI_API_BASE") {
            let provider = self
                .providers
                .openai
                .get_or_insert_with(ProviderConfig::default);
            provider.api_base = Some(val);
        }
    }

    /// Validate the configuration.
    ///
    /// The default model must resolve: either a profile-table entry or the
    /// default provider's own default model. A model with neither is fatal
    /// here rather than on the turn path.
    pub fn validate(&self) -> Result<()> {
        let spec = provider_spec(&self.defaults.provider).ok_or_else(|| {
            TurnError::Config(format!(
                "Unknown default provider '{}'",
                self.defaults.provider
            ))
        })?;

        if profile_for(&self.defaults.model).is_none() && self.defaults.model != spec.default_model
        {
            return Err(TurnError::Config(format!(
                "Default model '{}' has no profile and is not provider '{}' default",
                self.defaults.model, self.defaults.provider
            )));
        }

        if self.defaults.max_output_tokens == 0 {
            return Err(TurnError::Config(
                "defaults.max_output_tokens must be positive".into(),
            ));
        }
        if self.defaults.request_timeout_secs == 0 {
            return Err(TurnError::Config(
                "defaults.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Credential configured for a provider id, if any.
    pub fn credential_for(&self, provider_id: &str) -> Option<&str> {
        match provider_id {
            "gemini" => self.providers.gemini.as_ref().and_then(|p| p.credential()),
            "openai" => self.providers.openai.as_ref().and_then(|p| p.credential()),
            _ => None,
        }
    }

    /// Base URL override configured for a provider id, if any.
    pub fn api_base_for(&self, provider_id: &str) -> Option<&str> {
        match provider_id {
            "gemini" => self
                .providers
                .gemini
                .as_ref()
                .and_then(|p| p.api_base.as_deref()),
            "openai" => self
                .providers
                .openai
                .as_ref()
                .and_then(|p| p.api_base.as_deref()),
            _ => None,
        }
    }
}
