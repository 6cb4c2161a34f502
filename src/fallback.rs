//! Context-too-large fallback resolution
//!
//! When a turn fails because the prompt exhausted the model's window, the
//! orchestrator may retry exactly once on the model with the globally largest
//! context window. The replacement must be strictly larger than the failed
//! model's window; a same-size or smaller model would fail identically, so
//! `None` ends the turn with the typed error instead of a doomed retry.

use tracing::{info, warn};

use crate::models::{largest_window_excluding, profile_or_default};
use crate::selection::ProviderSelection;

/// Resolves the single fallback hop after a window-exhaustion failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFallbackResolver;

impl ContextFallbackResolver {
    /// Pick the fallback model for a failed (provider, model) pair.
    ///
    /// Returns `None` when no other model offers a strictly larger window.
    pub fn resolve(
        &self,
        failed_provider: &str,
        failed_model: &str,
    ) -> Option<ProviderSelection> {
        let failed_window = profile_or_default(failed_model).context_window_tokens;

        let candidate = largest_window_excluding(failed_provider, failed_model)?;
        if candidate.context_window_tokens <= failed_window {
            warn!(
                failed_provider,
                failed_model,
                failed_window,
                candidate = candidate.name,
                "No strictly larger context window available, not falling back"
            );
            return None;
        }

        info!(
            failed_provider,
            failed_model,
            fallback_provider = candidate.provider,
            fallback_model = candidate.name,
            fallback_window = candidate.context_window_tokens,
            "Resolved context fallback"
        );
        Some(ProviderSelection::new(candidate.provider, candidate.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_model_falls_up_to_largest_window() {
        let sel = ContextFallbackResolver
            .resolve("openai", "gpt-4o")
            .unwrap();
        // Both Gemini 2.5 models share the largest window; the table's first
        // match wins and the choice is deterministic.
        assert_eq!(sel.provider_id, "gemini");
        assert_eq!(sel.model_name, "gemini-2.5-pro");
    }

    #[test]
    fn test_largest_model_has_no_fallback() {
        // The other 1M-window model is not strictly larger.
        assert!(ContextFallbackResolver
            .resolve("gemini", "gemini-2.5-pro")
            .is_none());
        assert!(ContextFallbackResolver
            .resolve("gemini", "gemini-2.5-flash")
            .is_none());
    }

    #[test]
    fn test_near_largest_model_still_falls_back() {
        // gpt-4.1's window (1,047,576) is slightly under Gemini's 1,048,576.
        let sel = ContextFallbackResolver.resolve("openai", "gpt-4.1").unwrap();
        assert_eq!(sel.provider_id, "gemini");
    }

    #[test]
    fn test_unknown_model_uses_conservative_window() {
        // Unknown models budget as 128K, so the 1M-window models qualify.
        let sel = ContextFallbackResolver
            .resolve("mock", "mock-model")
            .unwrap();
        assert_eq!(sel.provider_id, "gemini");
    }
}
