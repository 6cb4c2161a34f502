//! Two-phase tool-calling protocol
//!
//! A turn is at most two provider calls. Phase 1 sends the assembled context
//! with tool schemas advertised. If the model answers directly with a JSON
//! object and requests nothing, the turn is done after one call. Anything
//! else goes through phase 2: requested tools are executed locally in request
//! order and their outcomes (failures included) are folded into a synthesized
//! follow-up message, while an ambiguous no-tool reply (not a JSON object)
//! gets the same finalize pass with an empty result set. There is no third
//! phase: a phase-2 reply is returned as-is, and the caller owns any repair
//! or retry.
//!
//! Window exhaustion detected in either phase propagates immediately so the
//! orchestrator can decide on its single fallback hop.

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::providers::{
    detect_context_exhaustion, GenerationRequest, ProviderAdapter, RawResponse, Usage,
};
use crate::story::Turn;
use crate::tools::{ToolFunctionRegistry, ToolResult};

/// Instruction appended to the synthesized tool-results message.
const FINALIZE_INSTRUCTION: &str =
    "Using the tool results above, produce the final narration response now. \
     Respond with the required JSON object only.";

/// Where a turn is in the protocol, for logging and outcome reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Phase-1 reply was a direct JSON answer; one provider call total.
    DirectAnswer,
    /// Phase 2 produced the answer (after tool execution, or as the finalize
    /// pass for an ambiguous phase-1 reply); two calls total.
    ToolAssisted,
}

/// The result of running the protocol for one turn.
#[derive(Debug, Clone)]
pub struct ProtocolOutcome {
    /// Final model output, unmodified
    pub text: String,
    /// Tool outcomes from phase 1, empty for direct answers
    pub tool_results: Vec<ToolResult>,
    /// Usage accumulated across both phases
    pub usage: Usage,
    /// How the turn concluded
    pub phase: TurnPhase,
}

/// Runs the two-phase protocol against one provider adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCallOrchestrator;

impl ToolCallOrchestrator {
    /// Run one turn.
    ///
    /// `request` is the fully assembled phase-1 request, tool schemas
    /// included. The registry executes whatever the model asks for; tool
    /// failures are echoed back to the model, never raised here.
    pub async fn run(
        &self,
        adapter: &dyn ProviderAdapter,
        request: GenerationRequest,
        registry: &ToolFunctionRegistry,
    ) -> Result<ProtocolOutcome> {
        let phase1 = adapter.generate(&request).await?;
        if let Some(err) = detect_context_exhaustion(&phase1) {
            return Err(err);
        }
        let mut usage = accumulate(Usage::default(), &phase1);

        if phase1.tool_requests.is_empty() && is_direct_json(&phase1.text) {
            debug!("Phase-1 reply is a direct JSON answer");
            return Ok(ProtocolOutcome {
                text: phase1.text,
                tool_results: Vec::new(),
                usage,
                phase: TurnPhase::DirectAnswer,
            });
        }

        // A no-tool reply that is not a JSON object is ambiguous and takes
        // the same finalize pass, with nothing to execute.
        let tool_results = if phase1.tool_requests.is_empty() {
            debug!("Phase-1 reply is neither JSON nor a tool request, finalizing in phase 2");
            Vec::new()
        } else {
            info!(
                count = phase1.tool_requests.len(),
                tools = ?phase1.tool_requests.iter().map(|r| r.tool_name.as_str()).collect::<Vec<_>>(),
                "Executing requested tools"
            );
            registry.execute_all(&phase1.tool_requests)
        };

        let phase2_request = build_phase2_request(&request, &phase1, &tool_results)?;
        let phase2 = adapter.generate(&phase2_request).await?;
        if let Some(err) = detect_context_exhaustion(&phase2) {
            return Err(err);
        }
        usage = accumulate(usage, &phase2);

        Ok(ProtocolOutcome {
            text: phase2.text,
            tool_results,
            usage,
            phase: TurnPhase::ToolAssisted,
        })
    }
}

/// Build the phase-2 request: the original context, the model's phase-1
/// reply, and a synthesized message carrying every tool outcome plus the
/// finalize instruction. Tool schemas are not re-advertised.
fn build_phase2_request(
    request: &GenerationRequest,
    phase1: &RawResponse,
    tool_results: &[ToolResult],
) -> Result<GenerationRequest> {
    let next_seq = request
        .contents
        .last()
        .map(|t| t.sequence_id + 1)
        .unwrap_or(0);

    let mut reply_text = phase1.text.clone();
    if reply_text.trim().is_empty() {
        reply_text = if phase1.tool_requests.is_empty() {
            "[empty reply]".to_string()
        } else {
            format!(
                "[requested tools: {}]",
                phase1
                    .tool_requests
                    .iter()
                    .map(|r| r.tool_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
    }

    let results_json = serde_json::to_string_pretty(tool_results)?;
    let results_text = format!(
        "Tool results:\n{}\n\n{}",
        results_json, FINALIZE_INSTRUCTION
    );

    let mut contents = request.contents.clone();
    contents.push(Turn::narrator(next_seq, &reply_text));
    contents.push(Turn::player(next_seq + 1, &results_text));

    let mut params = request.params.clone();
    params.tools = Vec::new();

    Ok(GenerationRequest {
        model: request.model.clone(),
        system: request.system.clone(),
        contents,
        params,
    })
}

/// Whether a reply is a direct JSON-object answer, tolerating a single
/// Markdown code fence around it.
pub fn is_direct_json(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(strip_json_fence(text)),
        Ok(Value::Object(_))
    )
}

/// Strip one surrounding ```json (or bare ```) fence, if present.
pub fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    inner.trim()
}

fn accumulate(usage: Usage, response: &RawResponse) -> Usage {
    let reported = response.usage.unwrap_or_default();
    Usage {
        prompt_tokens: usage.prompt_tokens + reported.prompt_tokens,
        completion_tokens: usage.completion_tokens + reported.completion_tokens,
    }
}
