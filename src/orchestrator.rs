//! Top-level request orchestration
//!
//! One entry point per game turn: budget the context, tier the entity roster,
//! truncate history, assemble the request, run the two-phase tool protocol,
//! and — only for window exhaustion — hop once to the largest-window model
//! before surfacing the typed error. Every stage is recomputed per turn; the
//! orchestrator holds no per-game state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::budget::{estimate_tokens, BudgetCalculator};
use crate::config::Config;
use crate::entities::{EntityRecord, EntityTieringEngine};
use crate::error::{Result, TurnError};
use crate::fallback::ContextFallbackResolver;
use crate::models::profile_or_default;
use crate::protocol::{ProtocolOutcome, ToolCallOrchestrator};
use crate::providers::{
    GeminiAdapter, GenerationParams, GenerationRequest, OpenAiAdapter, ProviderAdapter,
};
use crate::selection::ProviderSelection;
use crate::story::{render_transcript, Turn};
use crate::tools::ToolFunctionRegistry;
use crate::truncation::TruncationEngine;

/// Everything one turn needs as input.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Provider and model serving this turn
    pub selection: ProviderSelection,
    /// Base system instruction (rules, tone, output contract)
    pub system_prompt: String,
    /// Full story history, oldest first
    pub history: Vec<Turn>,
    /// Entity roster in canonical order
    pub roster: Vec<EntityRecord>,
    /// The player's current location
    pub current_location: String,
    /// The player action driving this turn
    pub user_action: String,
    /// Whether the scene is combat or otherwise complex
    pub is_combat: bool,
}

/// The orchestrator's answer for one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final model output, unmodified
    pub text: String,
    /// Per-turn correlation id, also on every log line of the turn
    pub request_id: Uuid,
    /// The selection that actually served the turn (differs from the request
    /// after a fallback hop)
    pub served_by: ProviderSelection,
    /// The protocol outcome, tool results and usage included
    pub protocol: ProtocolOutcome,
}

/// Orchestrates the full per-turn pipeline.
pub struct RequestOrchestrator {
    config: Config,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    tools: ToolFunctionRegistry,
    budget: BudgetCalculator,
    tiering: EntityTieringEngine,
    truncation: TruncationEngine,
    protocol: ToolCallOrchestrator,
    fallback: ContextFallbackResolver,
}

impl RequestOrchestrator {
    /// Build an orchestrator from config, constructing an adapter for every
    /// provider with a usable credential.
    pub fn from_config(config: Config, tools: ToolFunctionRegistry) -> Self {
        let mut orchestrator = Self::with_adapters(config.clone(), tools, HashMap::new());
        let timeout = Duration::from_secs(config.defaults.request_timeout_secs);

        if let Some(key) = config.credential_for("gemini") {
            let adapter = GeminiAdapter::with_timeout(key, config.api_base_for("gemini"), timeout);
            orchestrator
                .adapters
                .insert("gemini".to_string(), Arc::new(adapter));
        }
        if let Some(key) = config.credential_for("openai") {
            let adapter = OpenAiAdapter::with_timeout(key, config.api_base_for("openai"), timeout);
            orchestrator
                .adapters
                .insert("openai".to_string(), Arc::new(adapter));
        }

        orchestrator
    }

    /// Build an orchestrator around pre-constructed adapters. Used by tests
    /// and by embedders that bring their own transport.
    pub fn with_adapters(
        config: Config,
        tools: ToolFunctionRegistry,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        Self {
            config,
            adapters,
            tools,
            budget: BudgetCalculator,
            tiering: EntityTieringEngine,
            truncation: TruncationEngine,
            protocol: ToolCallOrchestrator,
            fallback: ContextFallbackResolver,
        }
    }

    /// Register or replace an adapter.
    pub fn register_adapter(&mut self, provider_id: &str, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(provider_id.to_string(), adapter);
    }

    /// Run one game turn end to end.
    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "turn",
            %request_id,
            provider = %request.selection.provider_id,
            model = %request.selection.model_name,
        );

        async move {
            match self.attempt(request, &request.selection, request_id).await {
                Ok(outcome) => Ok(outcome),
                Err(err) if err.is_context_too_large() => {
                    self.try_fallback(request, request_id, err).await
                }
                Err(err) => Err(err),
            }
        }
        .instrument(span)
        .await
    }

    /// The single fallback hop. Applies only to window exhaustion, runs at
    /// most once, and never cascades: a second exhaustion surfaces as-is.
    async fn try_fallback(
        &self,
        request: &TurnRequest,
        request_id: Uuid,
        original: TurnError,
    ) -> Result<TurnOutcome> {
        if !self.config.defaults.allow_context_fallback {
            warn!("Context fallback disabled, surfacing window exhaustion");
            return Err(original);
        }
        let Some(fallback) = self
            .fallback
            .resolve(&request.selection.provider_id, &request.selection.model_name)
        else {
            return Err(original);
        };

        info!(
            fallback_provider = %fallback.provider_id,
            fallback_model = %fallback.model_name,
            "Retrying once on larger-window model"
        );
        self.attempt(request, &fallback, request_id).await
    }

    /// One full pipeline pass against one selection.
    async fn attempt(
        &self,
        request: &TurnRequest,
        selection: &ProviderSelection,
        request_id: Uuid,
    ) -> Result<TurnOutcome> {
        let adapter = self
            .adapters
            .get(&selection.provider_id)
            .ok_or_else(|| {
                TurnError::ProviderUnavailable(format!(
                    "no credential configured for provider '{}'",
                    selection.provider_id
                ))
            })?
            .clone();

        let profile = profile_or_default(&selection.model_name);
        let plan = self.budget.compute(&profile, request.is_combat);

        let payload = self
            .tiering
            .payload(&request.roster, &request.history, &request.current_location);
        let system = if payload.is_empty() {
            request.system_prompt.clone()
        } else {
            format!(
                "{}\n\n## Entities\n{}",
                request.system_prompt,
                serde_json::to_string_pretty(&payload)?
            )
        };

        let mut contents = self
            .truncation
            .truncate_to_tokens(&request.history, plan.history_budget());
        let next_seq = contents.last().map(|t| t.sequence_id + 1).unwrap_or(0);
        contents.push(Turn::player(next_seq, &request.user_action));

        let prompt_tokens = estimate_tokens(&render_transcript(&contents));
        let system_tokens = estimate_tokens(&system);
        let max_output_tokens = self.budget.compute_output_limit(
            &profile,
            prompt_tokens,
            system_tokens,
            self.config.defaults.max_output_tokens,
        )?;

        info!(
            prompt_tokens,
            system_tokens,
            max_output_tokens,
            active_entities = payload.active_entities.len(),
            present_entities = payload.present_entities.len(),
            turns = contents.len(),
            "Dispatching turn"
        );

        let tools = if self.tools.is_empty() || !profile.supports_native_tools {
            Vec::new()
        } else {
            self.tools.schemas().to_vec()
        };

        let generation = GenerationRequest {
            model: selection.model_name.clone(),
            system,
            contents,
            params: GenerationParams {
                temperature: self.config.defaults.temperature,
                max_output_tokens,
                tools,
                safety_settings: None,
            },
        };

        let protocol = self
            .protocol
            .run(adapter.as_ref(), generation, &self.tools)
            .await?;

        info!(
            prompt_tokens = protocol.usage.prompt_tokens,
            completion_tokens = protocol.usage.completion_tokens,
            phase = ?protocol.phase,
            "Turn complete"
        );

        Ok(TurnOutcome {
            text: protocol.text.clone(),
            request_id,
            served_by: selection.clone(),
            protocol,
        })
    }
}
