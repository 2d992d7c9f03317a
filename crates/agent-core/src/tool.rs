//! Tool System
//!
//! Tools are the capabilities a round advertises to the model. Each one can
//! identify itself, describe its parameters, and be invoked with the arguments
//! the model chose. Invocation always produces text: failures inside a tool are
//! values that get rendered for the model, never errors for the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Arguments chosen by the model, keyed by parameter name
pub type ToolArguments = Map<String, Value>;

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation token, echoed back on the result
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result from tool execution, fed back to the model on the next step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call ID from the matching request
    pub id: String,

    /// Tool that was called
    pub name: String,

    /// Text produced by the tool
    pub output: String,
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    /// Required string parameter, the only kind the chat tools use
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required: true,
        }
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions, in declaration order
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// JSON Schema object describing the parameters, as function-calling APIs expect
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.param_type,
                    "description": param.description,
                }),
            );
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Why a tool could not produce its normal output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolFailure {
    /// A required parameter was absent or not a string
    MissingArgument(String),

    /// A parameter was present but unusable
    InvalidArgument { name: String, reason: String },

    /// The tool refused the input; the message is shown as-is
    Rejected(String),

    /// The backing service failed; the message is shown as-is
    Backend(String),
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument(name) => write!(f, "Missing required parameter: {name}"),
            Self::InvalidArgument { name, reason } => {
                write!(f, "Invalid value for '{name}': {reason}")
            }
            Self::Rejected(msg) | Self::Backend(msg) => f.write_str(msg),
        }
    }
}

/// Outcome of running a tool body
pub type ToolOutcome = std::result::Result<String, ToolFailure>;

/// Read a string argument, failing if it is absent
pub fn string_arg<'a>(
    arguments: &'a ToolArguments,
    name: &str,
) -> std::result::Result<&'a str, ToolFailure> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolFailure::MissingArgument(name.to_string()))
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to request this tool
    fn name(&self) -> &str;

    /// Description and parameters advertised to the model every step
    fn schema(&self) -> ToolSchema;

    /// Execute the tool body
    async fn run(&self, arguments: &ToolArguments) -> ToolOutcome;

    /// Check required parameters are present before running
    fn validate(&self, arguments: &ToolArguments) -> std::result::Result<(), ToolFailure> {
        for param in self.schema().parameters.iter().filter(|p| p.required) {
            if !arguments.contains_key(&param.name) {
                return Err(ToolFailure::MissingArgument(param.name.clone()));
            }
        }
        Ok(())
    }

    /// Validate, run, and render any failure as text
    async fn invoke(&self, arguments: &ToolArguments) -> String {
        let outcome = match self.validate(arguments) {
            Ok(()) => self.run(arguments).await,
            Err(failure) => Err(failure),
        };

        outcome.unwrap_or_else(|failure| {
            tracing::warn!(tool = %self.name(), %failure, "Tool returned a failure");
            failure.to_string()
        })
    }
}

/// Ordered set of tools available to one round
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool, replacing any tool with the same name in place
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Invoke the tool a call asks for.
    ///
    /// An unknown tool name is an error: the round cannot honour the request.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tracing::debug!(tool = %call.name, id = %call.id, "Invoking tool");
        let output = tool.invoke(&call.arguments).await;

        Ok(ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            output,
        })
    }

    /// Invoke every call in order, one at a time
    pub async fn invoke_all(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.invoke(call).await?);
        }
        Ok(results)
    }

    /// All tool schemas, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
