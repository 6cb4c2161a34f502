//! Tool registry and execution
//!
//! Game-mechanics callables the model may invoke mid-turn: dice rolls,
//! rule lookups, roster queries. Callables are synchronous pure functions
//! over JSON values; the registry executes a batch of requests in order and
//! records failures inline as result values, so the model always sees every
//! outcome and a bad argument never aborts the turn.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Registered name of the tool to call
    pub tool_name: String,
    /// JSON arguments as the model produced them
    pub arguments: Value,
}

/// The outcome of one tool invocation, echoed back to the model.
///
/// Failures are carried in `result` as `{"error": "..."}` rather than as an
/// `Err`; the model decides what to do with a failed roll or lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was invoked
    pub tool_name: String,
    /// Arguments it was invoked with
    pub arguments: Value,
    /// Output value, or an `{"error": ...}` object on failure
    pub result: Value,
}

/// Signature for a registered tool callable.
pub type ToolFn = Box<dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Schema advertised to the provider for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name the model uses to invoke it
    pub name: String,
    /// What the tool does, phrased for the model
    pub description: String,
    /// JSON Schema for the arguments object
    pub parameters: Value,
}

/// Registry of callable game-mechanics functions.
#[derive(Default)]
pub struct ToolFunctionRegistry {
    functions: HashMap<String, ToolFn>,
    schemas: Vec<ToolSchema>,
}

impl std::fmt::Debug for ToolFunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolFunctionRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolFunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A duplicate name replaces the earlier registration.
    pub fn register<F>(&mut self, schema: ToolSchema, func: F)
    where
        F: Fn(&Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        if self.functions.contains_key(&schema.name) {
            warn!(tool = %schema.name, "Replacing existing tool registration");
            self.schemas.retain(|s| s.name != schema.name);
        }
        self.functions.insert(schema.name.clone(), Box::new(func));
        self.schemas.push(schema);
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    /// Schemas to advertise to the provider.
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Whether any tools are registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Execute one request. Unknown tools and callable failures both produce
    /// an error-valued result, never an `Err`.
    pub fn execute(&self, request: &ToolRequest) -> ToolResult {
        let result = match self.functions.get(&request.tool_name) {
            Some(func) => match func(&request.arguments) {
                Ok(value) => value,
                Err(msg) => {
                    warn!(tool = %request.tool_name, error = %msg, "Tool execution failed");
                    serde_json::json!({ "error": msg })
                }
            },
            None => {
                warn!(tool = %request.tool_name, "Unknown tool requested");
                serde_json::json!({ "error": format!("unknown tool '{}'", request.tool_name) })
            }
        };
        debug!(tool = %request.tool_name, "Tool executed");
        ToolResult {
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
            result,
        }
    }

    /// Execute a batch in the order the model requested them.
    pub fn execute_all(&self, requests: &[ToolRequest]) -> Vec<ToolResult> {
        requests.iter().map(|r| self.execute(r)).collect()
    }
}
