//! Token estimation
//!
//! Providers disagree about tokenization, and the engine must budget before
//! it knows which provider will serve the turn. The default estimator is the
//! deterministic chars/4 heuristic; a provider-native count can be used when
//! available and silently falls back to the heuristic on any failure.

use tracing::debug;

use crate::providers::ProviderAdapter;

/// Approximate tokens per character for the default heuristic.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text.
///
/// Deterministic and provider-agnostic: `chars / 4`, never negative,
/// tolerant of empty input.
///
/// # Example
/// ```
/// use turnforge::budget::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcdefgh"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / CHARS_PER_TOKEN) as u64
}

/// Text → approximate token count.
///
/// A trait seam so budget and truncation code can be exercised with a fixed
/// estimator in tests while production wiring may substitute provider-backed
/// counting.
pub trait TokenEstimator: Send + Sync {
    /// Approximate token count for `text`. Must be total (never error).
    fn estimate(&self, text: &str) -> u64;
}

/// The default chars/4 estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimator;

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> u64 {
        estimate_tokens(text)
    }
}

/// Count tokens via the provider's native endpoint, falling back silently to
/// the character heuristic on any failure (missing endpoint included).
pub async fn count_with_adapter(adapter: &dyn ProviderAdapter, model: &str, text: &str) -> u64 {
    match adapter.count_tokens(model, text).await {
        Ok(n) => n,
        Err(e) => {
            debug!(provider = adapter.name(), error = %e, "Native token count failed, using heuristic");
            estimate_tokens(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_short() {
        // Fewer than 4 chars floors to zero, matching integer division.
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        // 4 multi-byte chars = 1 token even though the byte length is larger.
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_char_estimator_trait() {
        let est = CharEstimator;
        assert_eq!(est.estimate("x".repeat(400).as_str()), 100);
    }
}
