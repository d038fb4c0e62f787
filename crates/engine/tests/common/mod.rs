use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colloquy_core::{AgentResponse, Message, Provider, ProviderError, Tool, ToolError};
use serde_json::{Map, Value, json};

/// 按顺序返回预设回复的 Provider，克隆体共享调用计数。
#[derive(Clone)]
pub struct CountingProvider {
    responses: Arc<Vec<String>>,
    calls: Arc<AtomicUsize>,
    history_lens: Arc<Mutex<Vec<usize>>>,
}

impl CountingProvider {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Arc::new(responses.iter().map(|r| r.to_string()).collect()),
            calls: Arc::new(AtomicUsize::new(0)),
            history_lens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn shared(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self::new(responses))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用时收到的历史长度。
    pub fn history_lens(&self) -> Vec<usize> {
        self.history_lens
            .lock()
            .expect("history lock should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(
        &self,
        history: &[Message],
        _system_message: &str,
    ) -> Result<AgentResponse, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.history_lens
            .lock()
            .expect("history lock should not be poisoned")
            .push(history.len());
        Ok(AgentResponse::new(
            self.responses.get(index).cloned().unwrap_or_default(),
        ))
    }
}

/// 名为 `calc` 的工具，返回参数 `x` 的两倍。
pub struct DoublingTool;

#[async_trait]
impl Tool for DoublingTool {
    fn name(&self) -> &str {
        "calc"
    }

    fn description(&self) -> &str {
        "Doubles the number x"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "x": { "type": "number" } },
            "required": ["x"]
        })
    }

    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let x = parameters
            .get("x")
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::InvalidParameters("x must be an integer".to_string()))?;
        Ok(json!(x * 2))
    }
}
