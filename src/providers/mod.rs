//! LLM provider adapters
//!
//! Each adapter translates the engine's provider-neutral request into one
//! provider's wire format and normalizes the reply into a [`RawResponse`].
//! Everything above this layer (budgeting, truncation, the tool protocol)
//! is provider-agnostic.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProviderError, Result, TurnError};
use crate::story::Turn;
use crate::tools::{ToolRequest, ToolSchema};

/// Generation parameters shared by all providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Hard output-token ceiling, already clamped by the budget planner
    pub max_output_tokens: u64,
    /// Tool schemas to advertise; empty disables tool calling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
    /// Provider safety settings, passed through verbatim where supported
    /// (combat narration trips default content filters otherwise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Value>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_output_tokens: 8_192,
            tools: Vec::new(),
            safety_settings: None,
        }
    }
}

/// A provider-neutral generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model name within the provider
    pub model: String,
    /// System instruction
    pub system: String,
    /// Conversation turns, oldest first
    pub contents: Vec<Turn>,
    /// Generation parameters
    pub params: GenerationParams,
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,
    /// Tokens in the completion
    pub completion_tokens: u64,
}

/// A provider reply normalized to a common shape.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Concatenated text parts of the reply
    pub text: String,
    /// Tool invocations the model requested, in reply order
    pub tool_requests: Vec<ToolRequest>,
    /// Usage accounting, when the provider reports it
    pub usage: Option<Usage>,
    /// Provider finish reason (e.g. "STOP", "MAX_TOKENS", "length")
    pub finish_reason: Option<String>,
}

/// One LLM provider's transport and wire format.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider id, matching the config key ("gemini", "openai", ...)
    fn name(&self) -> &str;

    /// Send one generation request and normalize the reply.
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse>;

    /// Count tokens with the provider's native tokenizer.
    ///
    /// Default is unsupported; callers fall back to the character heuristic.
    async fn count_tokens(&self, _model: &str, _text: &str) -> Result<u64> {
        Err(ProviderError::Unknown(format!(
            "{} does not support native token counting",
            self.name()
        ))
        .into())
    }
}

/// Classify a non-2xx provider reply by status code and body.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    let message = body.chars().take(500).collect::<String>();
    match status {
        400 => ProviderError::InvalidRequest(message),
        401 | 403 => ProviderError::Auth(message),
        404 => ProviderError::ModelNotFound(message),
        429 => ProviderError::RateLimit(message),
        503 => ProviderError::Overloaded(message),
        500 | 502 | 504 => ProviderError::ServerError(message),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, message)),
    }
}

/// Map a non-2xx reply to a turn error, promoting the request-too-large
/// rejections some providers return as 400s into the typed
/// [`TurnError::ContextTooLarge`] signal.
pub fn parse_provider_failure(status: u16, body: &str) -> TurnError {
    if status == 400 && mentions_context_exhaustion(body) {
        return TurnError::ContextTooLarge {
            prompt_tokens: 0,
            completion_tokens: 0,
            finish_reason: "http_400".to_string(),
        };
    }
    TurnError::Provider(parse_provider_error(status, body))
}

fn mentions_context_exhaustion(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context length")
        || lower.contains("token limit")
        || lower.contains("exceeds the maximum")
        || lower.contains("input token count")
}

/// Detect window exhaustion in a nominally successful reply.
///
/// A reply whose finish reason is a length stop with no usable text means
/// the prompt consumed the window before any real output was produced.
pub fn detect_context_exhaustion(response: &RawResponse) -> Option<TurnError> {
    let reason = response.finish_reason.as_deref()?;
    let length_stop = matches!(reason, "MAX_TOKENS" | "length");
    if !length_stop {
        return None;
    }
    // A truncated-but-substantial reply is the caller's problem, not a
    // window failure.
    if response.text.trim().len() >= 32 || !response.tool_requests.is_empty() {
        return None;
    }
    let usage = response.usage.unwrap_or_default();
    Some(TurnError::ContextTooLarge {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        finish_reason: reason.to_string(),
    })
}
