//! Model profile table
//!
//! Static metadata for every model the engine knows how to budget for.
//! Every runtime model name must resolve to a profile here or fall back to
//! [`DEFAULT_PROFILE`], a deliberately conservative default.

use tracing::warn;

/// Static metadata describing a model's context capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    /// Model identifier as used on the wire (e.g. "gemini-2.5-flash")
    pub name: &'static str,
    /// Provider id owning this model
    pub provider: &'static str,
    /// Maximum tokens (input + output) the model accepts per call
    pub context_window_tokens: u64,
    /// Hard cap on output tokens regardless of remaining window
    pub max_output_tokens_cap: u64,
    /// Whether the provider supports native tool/function calling for it
    pub supports_native_tools: bool,
}

/// Profile table for all known models.
///
/// Window sizes are the providers' published limits. Order matters only for
/// readability; lookups are by name and fallback resolution scans the whole
/// table.
pub const MODEL_PROFILES: &[ModelProfile] = &[
    ModelProfile {
        name: "gemini-2.5-pro",
        provider: "gemini",
        context_window_tokens: 1_048_576,
        max_output_tokens_cap: 65_536,
        supports_native_tools: true,
    },
    ModelProfile {
        name: "gemini-2.5-flash",
        provider: "gemini",
        context_window_tokens: 1_048_576,
        max_output_tokens_cap: 65_536,
        supports_native_tools: true,
    },
    ModelProfile {
        name: "gpt-4.1",
        provider: "openai",
        context_window_tokens: 1_047_576,
        max_output_tokens_cap: 32_768,
        supports_native_tools: true,
    },
    ModelProfile {
        name: "gpt-4o",
        provider: "openai",
        context_window_tokens: 128_000,
        max_output_tokens_cap: 16_384,
        supports_native_tools: true,
    },
    ModelProfile {
        name: "gpt-4o-mini",
        provider: "openai",
        context_window_tokens: 128_000,
        max_output_tokens_cap: 16_384,
        supports_native_tools: true,
    },
];

/// Conservative default applied when a model has no table entry.
///
/// 128K window / 4K output is safe for every model the engine is likely to
/// meet; an unknown model getting this profile logs a warning rather than
/// failing the turn.
pub const DEFAULT_PROFILE: ModelProfile = ModelProfile {
    name: "unknown",
    provider: "unknown",
    context_window_tokens: 128_000,
    max_output_tokens_cap: 4_096,
    supports_native_tools: false,
};

/// Look up a model's profile by exact name.
pub fn profile_for(model: &str) -> Option<&'static ModelProfile> {
    MODEL_PROFILES.iter().find(|p| p.name == model)
}

/// Look up a model's profile, falling back to [`DEFAULT_PROFILE`].
///
/// Unknown models warn once per call site rather than erroring; config
/// validation is where unknown names should be caught.
pub fn profile_or_default(model: &str) -> ModelProfile {
    match profile_for(model) {
        Some(p) => *p,
        None => {
            warn!(model = %model, "No profile for model, using conservative default");
            DEFAULT_PROFILE
        }
    }
}

/// The model with the globally largest context window, excluding the given
/// (provider, model) pair.
///
/// Ties resolve to the earliest table entry so fallback choices are
/// deterministic. Returns `None` when the table (minus the exclusion) is
/// empty.
pub fn largest_window_excluding(
    provider: &str,
    model: &str,
) -> Option<&'static ModelProfile> {
    MODEL_PROFILES
        .iter()
        .filter(|p| !(p.provider == provider && p.name == model))
        .fold(None, |best: Option<&'static ModelProfile>, p| match best {
            Some(b) if b.context_window_tokens >= p.context_window_tokens => Some(b),
            _ => Some(p),
        })
}
