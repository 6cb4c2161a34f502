//! TurnForge - request-orchestration engine for LLM-driven interactive narration
//!
//! TurnForge turns a game state (story history, entity roster, player action)
//! into a single well-budgeted LLM request and a final narration reply. The
//! pipeline per turn:
//!
//! 1. [`budget`] — compute the token plan from the model profile
//! 2. [`entities`] — tier the roster into active/present payloads
//! 3. [`truncation`] — shrink story history to the remaining budget
//! 4. [`protocol`] — run the two-phase tool-calling protocol
//! 5. [`fallback`] — on window exhaustion, one hop to a larger-window model
//!
//! [`orchestrator::RequestOrchestrator`] wires the stages together.

pub mod budget;
pub mod config;
pub mod entities;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod protocol;
pub mod providers;
pub mod selection;
pub mod story;
pub mod tools;
pub mod truncation;

pub use config::Config;
pub use error::{ErrorStatus, ProviderError, Result, TurnError};
pub use orchestrator::{RequestOrchestrator, TurnOutcome, TurnRequest};
pub use providers::{
    GenerationParams, GenerationRequest, ProviderAdapter, RawResponse, Usage,
};
pub use selection::{ProviderModelSelector, ProviderSelection, UserPreference};
pub use story::{Actor, Turn};
pub use tools::{ToolFunctionRegistry, ToolRequest, ToolResult, ToolSchema};
