//! 工具包装：记录调用历史，并提供基于配置的静态工具。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use colloquy_core::{Tool, ToolCall, ToolError, ToolSchema};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

/// 对 [`Tool`] 的共享包装，在每次成功执行后追加一条调用记录。
///
/// 调用历史只用于测试与诊断，不参与任何控制流。
pub struct ToolHandle {
    tool: Arc<dyn Tool>,
    calls: RwLock<Vec<ToolCall>>,
}

impl ToolHandle {
    pub fn new(tool: impl Tool + 'static) -> Self {
        Self::from_arc(Arc::new(tool))
    }

    pub fn from_arc(tool: Arc<dyn Tool>) -> Self {
        Self {
            tool,
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.tool.name()
    }

    pub fn description(&self) -> &str {
        self.tool.description()
    }

    pub fn schema(&self) -> ToolSchema {
        self.tool.schema()
    }

    pub async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        debug!(tool = %self.name(), "executing tool");
        let result = self.tool.execute(parameters).await?;

        self.calls.write().await.push(ToolCall {
            parameters: parameters.clone(),
            result: result.clone(),
        });
        Ok(result)
    }

    pub async fn call_history(&self) -> Vec<ToolCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn last_call(&self) -> Option<ToolCall> {
        self.calls.read().await.last().cloned()
    }
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandle")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// 总是返回固定结果的工具，供脚本化场景使用。
#[derive(Debug, Clone)]
pub struct StaticTool {
    name: String,
    description: String,
    parameters: Value,
    result: Value,
}

impl StaticTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        result: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            result,
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, _parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        Ok(self.result.clone())
    }
}
