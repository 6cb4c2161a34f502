//! Gemini (Google AI) provider implementation
//!
//! Implements the `ProviderAdapter` trait for the Gemini `generateContent`
//! API, handling the nested contents/parts wire format, function calls, and
//! the native `countTokens` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::story::{Actor, Turn};
use crate::tools::{ToolRequest, ToolSchema};

use super::{
    parse_provider_failure, GenerationRequest, ProviderAdapter, RawResponse, Usage,
};

/// Default Gemini API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Per-call timeout applied when the caller supplies none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini provider adapter.
pub struct GeminiAdapter {
    api_key: String,
    api_base: String,
    timeout: Duration,
    client: Client,
}

impl GeminiAdapter {
    /// Create a new Gemini adapter with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self::with_timeout(api_key, None, DEFAULT_TIMEOUT)
    }

    /// Create an adapter against a custom base URL (proxies, test servers).
    pub fn with_base(api_key: &str, api_base: &str) -> Self {
        Self::with_timeout(api_key, Some(api_base), DEFAULT_TIMEOUT)
    }

    /// Create an adapter with an explicit per-call timeout and optional base
    /// URL override. This is the constructor config-driven wiring uses.
    pub fn with_timeout(api_key: &str, api_base: Option<&str>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            timeout,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create an adapter with a custom HTTP client.
    pub fn with_client(api_key: &str, api_base: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            client,
        }
    }

    /// The per-call timeout this adapter was built with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base, request.model
        );

        let body = GeminiRequest {
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(&request.system)],
            }),
            contents: request.contents.iter().map(content_from_turn).collect(),
            generation_config: GenerationConfig {
                temperature: request.params.temperature,
                max_output_tokens: request.params.max_output_tokens,
            },
            tools: if request.params.tools.is_empty() {
                None
            } else {
                Some(vec![GeminiTools {
                    function_declarations: request
                        .params
                        .tools
                        .iter()
                        .map(declaration_from_schema)
                        .collect(),
                }])
            },
            safety_settings: request.params.safety_settings.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(parse_provider_failure(status, &error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        Ok(convert_response(gemini_response))
    }

    async fn count_tokens(&self, model: &str, text: &str) -> Result<u64> {
        let url = format!("{}/models/{}:countTokens", self.api_base, model);
        let body = CountTokensRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(text)],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(parse_provider_failure(status, &error_text));
        }

        let counted: CountTokensResponse = response.json().await?;
        Ok(counted.total_tokens)
    }
}

fn content_from_turn(turn: &Turn) -> Content {
    let role = match turn.actor {
        Actor::Player => "user",
        Actor::Narrator => "model",
    };
    Content {
        role: Some(role.to_string()),
        parts: vec![Part::text(&turn.text)],
    }
}

fn declaration_from_schema(schema: &ToolSchema) -> FunctionDeclaration {
    FunctionDeclaration {
        name: schema.name.clone(),
        description: schema.description.clone(),
        parameters: schema.parameters.clone(),
    }
}

fn convert_response(response: GeminiResponse) -> RawResponse {
    let mut text = String::new();
    let mut tool_requests = Vec::new();
    let mut finish_reason = None;

    if let Some(candidate) = response.candidates.into_iter().next() {
        finish_reason = candidate.finish_reason;
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(t) = part.text {
                    text.push_str(&t);
                }
                if let Some(call) = part.function_call {
                    tool_requests.push(ToolRequest {
                        tool_name: call.name,
                        arguments: call.args,
                    });
                }
            }
        }
    }

    let usage = response.usage_metadata.map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
    });

    RawResponse {
        text,
        tool_requests,
        usage,
        finish_reason,
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTools>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl Part {
    fn text(s: &str) -> Self {
        Self {
            text: Some(s.to_string()),
            function_call: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Serialize)]
struct CountTokensRequest {
    contents: Vec<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: u64,
}
