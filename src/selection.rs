//! Provider and model selection
//!
//! Centralizes provider metadata and the mapping from user/test context to a
//! runtime [`ProviderSelection`]. Priority order:
//!
//! 1. Test/mock mode forces the fixed test selection.
//! 2. A user preference is honored when its model is in the provider's
//!    allowlist (an unlisted model falls back to the provider default).
//! 3. Otherwise the configured default provider and model.
//! 4. If the default provider has no credential, the first alternate
//!    provider with one is used instead.
//! 5. With no credential anywhere, the default is returned unchanged; the
//!    outbound call then fails with an explicit missing-credential error
//!    rather than a guess.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;

/// Metadata describing an LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Config key / provider id (e.g. "gemini")
    pub id: &'static str,
    /// Model used when a preference names an unlisted model
    pub default_model: &'static str,
    /// Models this provider accepts
    pub allowed_models: &'static [&'static str],
}

/// Provider registry in alternate-fallback priority order.
pub const PROVIDER_REGISTRY: &[ProviderSpec] = &[
    ProviderSpec {
        id: "gemini",
        default_model: "gemini-2.5-flash",
        allowed_models: &["gemini-2.5-pro", "gemini-2.5-flash"],
    },
    ProviderSpec {
        id: "openai",
        default_model: "gpt-4o",
        allowed_models: &["gpt-4.1", "gpt-4o", "gpt-4o-mini"],
    },
];

/// Look up a provider spec by id.
pub fn provider_spec(id: &str) -> Option<&'static ProviderSpec> {
    PROVIDER_REGISTRY.iter().find(|s| s.id == id)
}

/// A resolved (provider, model) pair for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSelection {
    /// Provider id
    pub provider_id: String,
    /// Model name within that provider
    pub model_name: String,
}

impl ProviderSelection {
    /// Create a selection.
    pub fn new(provider_id: &str, model_name: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            model_name: model_name.to_string(),
        }
    }
}

/// A user's stored provider/model preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    /// Preferred provider id
    pub provider_id: String,
    /// Preferred model name
    pub model_name: String,
}

/// Resolves the provider and model for a turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderModelSelector;

impl ProviderModelSelector {
    /// Select the provider and model for a turn.
    ///
    /// `preference` is the calling user's stored choice, if any. Test mode
    /// (from config) wins over everything, so integration runs never touch a
    /// real provider by accident.
    pub fn select(&self, config: &Config, preference: Option<&UserPreference>) -> ProviderSelection {
        if config.test_mode.enabled {
            debug!(
                provider = %config.test_mode.provider,
                model = %config.test_mode.model,
                "Test mode active, forcing test selection"
            );
            return ProviderSelection::new(&config.test_mode.provider, &config.test_mode.model);
        }

        if let Some(pref) = preference {
            if let Some(spec) = provider_spec(&pref.provider_id) {
                if spec.allowed_models.contains(&pref.model_name.as_str()) {
                    return ProviderSelection::new(&pref.provider_id, &pref.model_name);
                }
                warn!(
                    provider = %pref.provider_id,
                    model = %pref.model_name,
                    "Preferred model not in provider allowlist, using provider default"
                );
                return ProviderSelection::new(spec.id, spec.default_model);
            }
            warn!(provider = %pref.provider_id, "Preferred provider unknown, using defaults");
        }

        let default_spec = provider_spec(&config.defaults.provider);
        if config.credential_for(&config.defaults.provider).is_some() {
            return ProviderSelection::new(&config.defaults.provider, &config.defaults.model);
        }

        // Default provider lacks a credential: walk the alternates.
        for spec in PROVIDER_REGISTRY {
            if spec.id == config.defaults.provider {
                continue;
            }
            if config.credential_for(spec.id).is_some() {
                warn!(
                    default_provider = %config.defaults.provider,
                    alternate = %spec.id,
                    "Default provider has no credential, using alternate"
                );
                return ProviderSelection::new(spec.id, spec.default_model);
            }
        }

        // Nothing has a credential. Return the default unchanged; the call
        // site raises the explicit missing-credential error.
        let model = default_spec
            .map(|s| {
                if config.defaults.model.is_empty() {
                    s.default_model.to_string()
                } else {
                    config.defaults.model.clone()
                }
            })
            .unwrap_or_else(|| config.defaults.model.clone());
        ProviderSelection::new(&config.defaults.provider, &model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn config_with_keys(gemini: bool, openai: bool) -> Config {
        let mut config = Config::default();
        if gemini {
            config.providers.gemini = Some(ProviderConfig {
                api_key: Some("g-key".into()),
                api_base: None,
            });
        }
        if openai {
            config.providers.openai = Some(ProviderConfig {
                api_key: Some("o-key".into()),
                api_base: None,
            });
        }
        config
    }

    #[test]
    fn test_test_mode_wins_over_preference() {
        let mut config = config_with_keys(true, true);
        config.test_mode.enabled = true;
        let pref = UserPreference {
            provider_id: "openai".into(),
            model_name: "gpt-4o".into(),
        };
        let sel = ProviderModelSelector.select(&config, Some(&pref));
        assert_eq!(sel.provider_id, "mock");
        assert_eq!(sel.model_name, "mock-model");
    }

    #[test]
    fn test_valid_preference_honored() {
        let config = config_with_keys(true, true);
        let pref = UserPreference {
            provider_id: "openai".into(),
            model_name: "gpt-4o-mini".into(),
        };
        let sel = ProviderModelSelector.select(&config, Some(&pref));
        assert_eq!(sel, ProviderSelection::new("openai", "gpt-4o-mini"));
    }

    #[test]
    fn test_unlisted_model_falls_back_to_provider_default() {
        let config = config_with_keys(true, true);
        let pref = UserPreference {
            provider_id: "openai".into(),
            model_name: "gpt-2".into(),
        };
        let sel = ProviderModelSelector.select(&config, Some(&pref));
        assert_eq!(sel, ProviderSelection::new("openai", "gpt-4o"));
    }

    #[test]
    fn test_unknown_preferred_provider_uses_defaults() {
        let config = config_with_keys(true, false);
        let pref = UserPreference {
            provider_id: "legacy-ai".into(),
            model_name: "whatever".into(),
        };
        let sel = ProviderModelSelector.select(&config, Some(&pref));
        assert_eq!(sel, ProviderSelection::new("gemini", "gemini-2.5-flash"));
    }

    #[test]
    fn test_no_preference_uses_defaults() {
        let config = config_with_keys(true, true);
        let sel = ProviderModelSelector.select(&config, None);
        assert_eq!(sel.provider_id, "gemini");
        assert_eq!(sel.model_name, "gemini-2.5-flash");
    }

    #[test]
    fn test_missing_default_credential_walks_alternates() {
        let config = config_with_keys(false, true);
        let sel = ProviderModelSelector.select(&config, None);
        assert_eq!(sel, ProviderSelection::new("openai", "gpt-4o"));
    }

    #[test]
    fn test_no_credentials_returns_default_anyway() {
        let config = config_with_keys(false, false);
        let sel = ProviderModelSelector.select(&config, None);
        // The selector does not guess; the call site will fail explicitly.
        assert_eq!(sel.provider_id, "gemini");
        assert_eq!(sel.model_name, "gemini-2.5-flash");
    }

    #[test]
    fn test_registry_models_have_profiles() {
        use crate::models::profile_for;
        for spec in PROVIDER_REGISTRY {
            assert!(profile_for(spec.default_model).is_some());
            for model in spec.allowed_models {
                assert!(profile_for(model).is_some(), "missing profile for {}", model);
            }
        }
    }
}
