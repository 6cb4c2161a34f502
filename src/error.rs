//! Error types for TurnForge
//!
//! This module defines all error types used throughout the engine.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Provides fine-grained categorization of LLM provider HTTP errors,
/// enabling retry and fallback decisions without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// 500/502/504 — Server-side errors
    ServerError(String),
    /// 400 — Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 — Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// 503 or provider `overloaded_error` — transient capacity exhaustion
    Overloaded(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient.
    ///
    /// The turn pipeline itself never retries these (transport failures
    /// surface unmodified), but callers above may.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Overloaded(_) => Some(503),
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for TurnError {
    fn from(err: ProviderError) -> Self {
        TurnError::Provider(err)
    }
}

// ============================================================================
// Caller-Facing Status
// ============================================================================

/// Coarse status surfaced at the service boundary.
///
/// The engine never emits user-facing text; it only tags each failure with
/// the status class the boundary layer should map it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// Input cannot be processed at any size the model accepts (422-class).
    Unprocessable,
    /// The provider is temporarily unable to serve the request (503-class).
    Unavailable,
    /// Everything else (500-class).
    Internal,
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for TurnForge operations.
#[derive(Error, Debug)]
pub enum TurnError {
    /// Input consumed so much of the context window that no meaningful output
    /// could be produced. Carries the provider-reported token counts so the
    /// caller can log exactly how far over budget the turn was.
    #[error("Context too large: prompt={prompt_tokens} completion={completion_tokens} finish_reason={finish_reason}")]
    ContextTooLarge {
        /// Tokens the provider counted in the prompt
        prompt_tokens: u64,
        /// Tokens produced before the window was exhausted
        completion_tokens: u64,
        /// Provider finish reason (e.g. "MAX_TOKENS", "length")
        finish_reason: String,
    },

    /// Structured provider error with classification.
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// No credential is available for the selected provider.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Final output failed the caller's narrative-shape validation. The
    /// engine itself never constructs this: it returns the phase-2 text
    /// unmodified, and the embedding service raises this after validating,
    /// with repair/retry as its job.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// Configuration-related errors (unknown model, missing required fields).
    /// These should surface at config-validation time, never per turn.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors (network, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TurnError {
    /// Map this error to the caller-facing status class.
    pub fn status(&self) -> ErrorStatus {
        match self {
            TurnError::ContextTooLarge { .. } => ErrorStatus::Unprocessable,
            TurnError::Provider(p) if p.is_transient() => ErrorStatus::Unavailable,
            TurnError::ProviderUnavailable(_) => ErrorStatus::Unavailable,
            _ => ErrorStatus::Internal,
        }
    }

    /// Returns `true` for the context-too-large signal, which is the only
    /// error class the orchestrator handles with a fallback hop.
    pub fn is_context_too_large(&self) -> bool {
        matches!(self, TurnError::ContextTooLarge { .. })
    }
}

/// A specialized `Result` type for TurnForge operations.
pub type Result<T> = std::result::Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TurnError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_context_too_large_display() {
        let err = TurnError::ContextTooLarge {
            prompt_tokens: 305_000,
            completion_tokens: 1,
            finish_reason: "MAX_TOKENS".into(),
        };
        let s = err.to_string();
        assert!(s.contains("305000"));
        assert!(s.contains("MAX_TOKENS"));
    }

    #[test]
    fn test_status_mapping() {
        let too_large = TurnError::ContextTooLarge {
            prompt_tokens: 1,
            completion_tokens: 0,
            finish_reason: "length".into(),
        };
        assert_eq!(too_large.status(), ErrorStatus::Unprocessable);
        assert!(too_large.is_context_too_large());

        let overloaded = TurnError::Provider(ProviderError::Overloaded("busy".into()));
        assert_eq!(overloaded.status(), ErrorStatus::Unavailable);

        let missing = TurnError::ProviderUnavailable("no credential".into());
        assert_eq!(missing.status(), ErrorStatus::Unavailable);

        let auth = TurnError::Provider(ProviderError::Auth("bad key".into()));
        assert_eq!(auth.status(), ErrorStatus::Internal);

        let malformed = TurnError::MalformedOutput("not json".into());
        assert_eq!(malformed.status(), ErrorStatus::Internal);
    }

    #[test]
    fn test_provider_error_is_transient() {
        assert!(ProviderError::RateLimit("429".into()).is_transient());
        assert!(ProviderError::ServerError("500".into()).is_transient());
        assert!(ProviderError::Timeout("30s".into()).is_transient());
        assert!(ProviderError::Overloaded("busy".into()).is_transient());

        assert!(!ProviderError::Auth("401".into()).is_transient());
        assert!(!ProviderError::InvalidRequest("400".into()).is_transient());
        assert!(!ProviderError::ModelNotFound("404".into()).is_transient());
        assert!(!ProviderError::Unknown("???".into()).is_transient());
    }

    #[test]
    fn test_provider_error_status_code() {
        assert_eq!(ProviderError::Auth("x".into()).status_code(), Some(401));
        assert_eq!(ProviderError::RateLimit("x".into()).status_code(), Some(429));
        assert_eq!(
            ProviderError::ServerError("x".into()).status_code(),
            Some(500)
        );
        assert_eq!(
            ProviderError::InvalidRequest("x".into()).status_code(),
            Some(400)
        );
        assert_eq!(
            ProviderError::ModelNotFound("x".into()).status_code(),
            Some(404)
        );
        assert_eq!(ProviderError::Timeout("x".into()).status_code(), None);
        assert_eq!(
            ProviderError::Overloaded("x".into()).status_code(),
            Some(503)
        );
        assert_eq!(ProviderError::Unknown("x".into()).status_code(), None);
    }

    #[test]
    fn test_provider_error_into_turn_error() {
        let pe = ProviderError::RateLimit("too fast".into());
        let te: TurnError = pe.into();
        assert!(matches!(te, TurnError::Provider(_)));
        assert!(te.to_string().contains("Rate limit error"));
    }
}
