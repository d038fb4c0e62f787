use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid tool parameters: {0}")]
    InvalidParameters(String),
    #[error("tool execution failed: {0}")]
    Failed(String),
}

/// Description of a tool as rendered into an agent's system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One recorded `(parameters, result)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub parameters: Map<String, Value>,
    pub result: Value,
}

/// A named capability an agent can invoke through the tool-call protocol.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted parameters.
    fn parameters(&self) -> Value;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError>;
}
