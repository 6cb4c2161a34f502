//! End-to-end orchestrator tests against scripted provider adapters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use turnforge::entities::EntityRecord;
use turnforge::error::{ErrorStatus, TurnError};
use turnforge::orchestrator::{RequestOrchestrator, TurnRequest};
use turnforge::providers::{GenerationRequest, ProviderAdapter, RawResponse, Usage};
use turnforge::selection::ProviderSelection;
use turnforge::story::Turn;
use turnforge::tools::{ToolFunctionRegistry, ToolSchema};
use turnforge::{Config, Result};

/// Replays scripted responses and records every request it receives.
struct ScriptedAdapter {
    id: &'static str,
    responses: Mutex<Vec<Result<RawResponse>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedAdapter {
    fn new(id: &'static str, responses: Vec<Result<RawResponse>>) -> Arc<Self> {
        Arc::new(Self {
            id,
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> GenerationRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        self.id
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "adapter {} called too often", self.id);
        responses.remove(0)
    }
}

fn narration(text: &str) -> RawResponse {
    RawResponse {
        text: text.to_string(),
        finish_reason: Some("STOP".into()),
        usage: Some(Usage {
            prompt_tokens: 200,
            completion_tokens: 20,
        }),
        ..Default::default()
    }
}

fn exhaustion() -> RawResponse {
    RawResponse {
        text: String::new(),
        finish_reason: Some("MAX_TOKENS".into()),
        usage: Some(Usage {
            prompt_tokens: 305_000,
            completion_tokens: 1,
        }),
        ..Default::default()
    }
}

fn dice_registry() -> ToolFunctionRegistry {
    let mut registry = ToolFunctionRegistry::new();
    registry.register(
        ToolSchema {
            name: "roll_dice".into(),
            description: "Roll dice in XdY notation".into(),
            parameters: json!({"type": "object"}),
        },
        |_| Ok(json!({"total": 17, "rolls": [17]})),
    );
    registry
}

fn orchestrator_with(
    adapters: Vec<(&str, Arc<ScriptedAdapter>)>,
    registry: ToolFunctionRegistry,
    allow_fallback: bool,
) -> RequestOrchestrator {
    let mut config = Config::default();
    config.defaults.allow_context_fallback = allow_fallback;
    let map: HashMap<String, Arc<dyn ProviderAdapter>> = adapters
        .into_iter()
        .map(|(id, a)| (id.to_string(), a as Arc<dyn ProviderAdapter>))
        .collect();
    RequestOrchestrator::with_adapters(config, registry, map)
}

fn tavern_turn(selection: ProviderSelection) -> TurnRequest {
    TurnRequest {
        selection,
        system_prompt: "You are the game master. Reply with a JSON object.".into(),
        history: vec![
            Turn::player(0, "I enter the tavern"),
            Turn::narrator(1, "Greta the barkeep nods at you from behind the bar."),
        ],
        roster: vec![
            EntityRecord {
                name: "Greta".into(),
                role: "barkeep".into(),
                attitude: "friendly".into(),
                status: "working".into(),
                hp_current: 10,
                hp_max: 10,
                location: "tavern".into(),
            },
            EntityRecord {
                name: "Mordecai".into(),
                role: "wizard".into(),
                attitude: "aloof".into(),
                status: "studying".into(),
                hp_current: 22,
                hp_max: 22,
                location: "tower".into(),
            },
        ],
        current_location: "tavern".into(),
        user_action: "I order an ale and ask about rumors".into(),
        is_combat: false,
    }
}

#[tokio::test]
async fn direct_json_turn_is_single_call() {
    let adapter = ScriptedAdapter::new(
        "gemini",
        vec![Ok(narration(r#"{"narration": "Greta slides you an ale."}"#))],
    );
    let orchestrator = orchestrator_with(vec![("gemini", adapter.clone())], dice_registry(), true);

    let outcome = orchestrator
        .run_turn(&tavern_turn(ProviderSelection::new("gemini", "gemini-2.5-flash")))
        .await
        .unwrap();

    assert_eq!(adapter.call_count(), 1);
    assert!(outcome.text.contains("ale"));
    assert_eq!(outcome.served_by.provider_id, "gemini");
    assert!(outcome.protocol.tool_results.is_empty());

    // Mentioned, co-located entity rides along in the system instruction.
    let sent = adapter.request(0);
    assert!(sent.system.contains("Greta"));
    assert!(sent.system.contains("10/10"));
    // Off-location, unmentioned entity does not.
    assert!(!sent.system.contains("Mordecai"));
    // The player action is the last turn sent.
    assert!(sent.contents.last().unwrap().text.contains("rumors"));
}

#[tokio::test]
async fn tool_turn_makes_two_calls_with_results_in_second() {
    let adapter = ScriptedAdapter::new(
        "gemini",
        vec![
            Ok(RawResponse {
                tool_requests: vec![turnforge::ToolRequest {
                    tool_name: "roll_dice".into(),
                    arguments: json!({"notation": "1d20"}),
                }],
                finish_reason: Some("STOP".into()),
                ..Default::default()
            }),
            Ok(narration(r#"{"narration": "The stranger beats your roll."}"#)),
        ],
    );
    let orchestrator = orchestrator_with(vec![("gemini", adapter.clone())], dice_registry(), true);

    let outcome = orchestrator
        .run_turn(&tavern_turn(ProviderSelection::new("gemini", "gemini-2.5-flash")))
        .await
        .unwrap();

    assert_eq!(adapter.call_count(), 2);
    assert_eq!(outcome.protocol.tool_results.len(), 1);
    assert_eq!(outcome.protocol.tool_results[0].result["total"], 17);

    let phase2 = adapter.request(1);
    assert!(phase2.contents.last().unwrap().text.contains("\"total\": 17"));
    assert!(phase2.params.tools.is_empty(), "tools must not be re-advertised");
}

#[tokio::test]
async fn window_exhaustion_falls_back_once_to_larger_model() {
    let small = ScriptedAdapter::new("openai", vec![Ok(exhaustion())]);
    let large = ScriptedAdapter::new(
        "gemini",
        vec![Ok(narration(r#"{"narration": "The tale continues."}"#))],
    );
    let orchestrator = orchestrator_with(
        vec![("openai", small.clone()), ("gemini", large.clone())],
        ToolFunctionRegistry::new(),
        true,
    );

    let outcome = orchestrator
        .run_turn(&tavern_turn(ProviderSelection::new("openai", "gpt-4o")))
        .await
        .unwrap();

    assert_eq!(small.call_count(), 1);
    assert_eq!(large.call_count(), 1);
    assert_eq!(outcome.served_by, ProviderSelection::new("gemini", "gemini-2.5-pro"));
    assert!(outcome.text.contains("continues"));
}

#[tokio::test]
async fn fallback_disabled_surfaces_typed_error() {
    let small = ScriptedAdapter::new("openai", vec![Ok(exhaustion())]);
    let large = ScriptedAdapter::new("gemini", vec![]);
    let orchestrator = orchestrator_with(
        vec![("openai", small.clone()), ("gemini", large.clone())],
        ToolFunctionRegistry::new(),
        false,
    );

    let err = orchestrator
        .run_turn(&tavern_turn(ProviderSelection::new("openai", "gpt-4o")))
        .await
        .unwrap_err();

    assert!(err.is_context_too_large());
    assert_eq!(err.status(), ErrorStatus::Unprocessable);
    assert_eq!(large.call_count(), 0);
}

#[tokio::test]
async fn exhaustion_on_largest_model_never_cascades() {
    // gemini-2.5-pro already has the largest window; a second hop would be
    // doomed, so the error must surface after one attempt.
    let adapter = ScriptedAdapter::new("gemini", vec![Ok(exhaustion())]);
    let orchestrator =
        orchestrator_with(vec![("gemini", adapter.clone())], ToolFunctionRegistry::new(), true);

    let err = orchestrator
        .run_turn(&tavern_turn(ProviderSelection::new("gemini", "gemini-2.5-pro")))
        .await
        .unwrap_err();

    assert!(err.is_context_too_large());
    assert_eq!(adapter.call_count(), 1);
}

#[tokio::test]
async fn transient_provider_error_surfaces_as_unavailable() {
    let adapter = ScriptedAdapter::new(
        "gemini",
        vec![Err(TurnError::Provider(
            turnforge::ProviderError::Overloaded("model busy".into()),
        ))],
    );
    let orchestrator =
        orchestrator_with(vec![("gemini", adapter.clone())], ToolFunctionRegistry::new(), true);

    let err = orchestrator
        .run_turn(&tavern_turn(ProviderSelection::new("gemini", "gemini-2.5-flash")))
        .await
        .unwrap_err();

    // No retry, no fallback: one call, status maps to 503-class.
    assert_eq!(adapter.call_count(), 1);
    assert_eq!(err.status(), ErrorStatus::Unavailable);
}
