//! OpenAI provider implementation
//!
//! Implements the `ProviderAdapter` trait for the chat completions API with
//! its flat message list and stringified tool-call arguments.

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

/// Default OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Per-call timeout applied when the caller supplies none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI provider adapter.
pub struct OpenAiAdapter {
    api_key: String,
    api_base: String,
    timeout: Duration,
    client: Client,
}

impl OpenAiAdapter {
    /// Create a new OpenAI adapter with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self::with_timeout(api_key, None, DEFAULT_TIMEOUT)
    }

    /// Create an adapter against a custom base URL (proxies, compatible
    /// gateways, test servers).
    pub fn with_base(api_key: &str, api_base: &str) -> Self {
        Self::with_timeout(api_key, Some(api_base), DEFAULT_TIMEOUT)
    }

    /// Create an adapter with an explicit per-call timeout and optional base
    /// URL override. This is the constructor config-driven wiring uses.
    pub fn with_timeout(api_key: &str, api_base: Option<&str>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(OPENAI_API_BASE)
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
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        }];
        messages.extend(request.contents.iter().map(message_from_turn));

        let body = OpenAiRequest {
            model: request.model.clone(),
            messages,
            temperature: request.params.temperature,
            max_completion_tokens: request.params.max_output_tokens,
            tools: if request.params.tools.is_empty() {
                None
            } else {
                Some(
                    request
                        .params
                        .tools
                        .iter()
                        .map(tool_from_schema)
                        .collect(),
                )
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(parse_provider_failure(status, &error_text));
        }

        let openai_response: OpenAiResponse = response.json().await?;
        Ok(convert_response(openai_response))
    }
}

fn message_from_turn(turn: &Turn) -> ChatMessage {
    let role = match turn.actor {
        Actor::Player => "user",
        Actor::Narrator => "assistant",
    };
    ChatMessage {
        role: role.to_string(),
        content: turn.text.clone(),
    }
}

fn tool_from_schema(schema: &ToolSchema) -> OpenAiTool {
    OpenAiTool {
        tool_type: "function".to_string(),
        function: OpenAiFunction {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.parameters.clone(),
        },
    }
}

fn convert_response(response: OpenAiResponse) -> RawResponse {
    let mut text = String::new();
    let mut tool_requests = Vec::new();
    let mut finish_reason = None;

    if let Some(choice) = response.choices.into_iter().next() {
        finish_reason = choice.finish_reason;
        if let Some(content) = choice.message.content {
            text = content;
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            // Arguments arrive as a JSON string; a malformed one is kept as a
            // string value so the tool layer records the failure inline.
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            tool_requests.push(ToolRequest {
                tool_name: call.function.name,
                arguments,
            });
        }
    }

    let usage = response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
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
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_completion_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
