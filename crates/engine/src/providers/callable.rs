use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use colloquy_core::{AgentResponse, Message, Provider, ProviderError};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use super::last_content;

/// 以对象形式接入的既有 Agent。
#[async_trait]
pub trait ExistingAgent: Send + Sync {
    async fn call(&self, prompt: &str) -> Result<Value, String>;
}

type SyncCall = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;
type AsyncCall = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;
type Extractor = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// 调用既有 Agent 的方式。
#[derive(Clone)]
pub enum CallStrategy {
    /// 同步函数。
    Sync(SyncCall),
    /// 返回 future 的异步函数。
    Async(AsyncCall),
    /// 实现了 [`ExistingAgent`] 的对象。
    Object(Arc<dyn ExistingAgent>),
}

impl CallStrategy {
    pub fn sync(call: impl Fn(&str) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(call))
    }

    pub fn asynchronous(
        call: impl Fn(String) -> BoxFuture<'static, Result<Value, String>> + Send + Sync + 'static,
    ) -> Self {
        Self::Async(Arc::new(call))
    }

    pub fn object(agent: impl ExistingAgent + 'static) -> Self {
        Self::Object(Arc::new(agent))
    }

    async fn invoke(&self, prompt: &str) -> Result<Value, String> {
        match self {
            CallStrategy::Sync(call) => call(prompt),
            CallStrategy::Async(call) => call(prompt.to_string()).await,
            CallStrategy::Object(agent) => agent.call(prompt).await,
        }
    }
}

/// 把既有 Agent 包装成 [`Provider`]。
///
/// 只把最后一条消息的内容交给被包装的 Agent。被包装 Agent 的错误不会向上
/// 传播，而是变成一条空内容回复，并在元数据中标记 `error`。
pub struct CallableProvider {
    strategy: CallStrategy,
    extractor: Extractor,
}

impl CallableProvider {
    pub fn new(strategy: CallStrategy) -> Self {
        Self {
            strategy,
            extractor: Arc::new(default_extract),
        }
    }

    pub fn with_extractor(
        mut self,
        extract: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.extractor = Arc::new(extract);
        self
    }
}

impl fmt::Debug for CallableProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            CallStrategy::Sync(_) => "sync",
            CallStrategy::Async(_) => "async",
            CallStrategy::Object(_) => "object",
        };
        f.debug_struct("CallableProvider")
            .field("strategy", &strategy)
            .finish_non_exhaustive()
    }
}

fn default_extract(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Provider for CallableProvider {
    fn name(&self) -> &str {
        "existing"
    }

    async fn generate(
        &self,
        history: &[Message],
        _system_message: &str,
    ) -> Result<AgentResponse, ProviderError> {
        let started = Instant::now();
        let outcome = self.strategy.invoke(last_content(history)).await;

        let mut response = match outcome {
            Ok(raw) => AgentResponse::new((self.extractor)(&raw))
                .with_metadata("agent_type", Value::from("existing"))
                .with_raw_response(raw),
            Err(error) => {
                warn!(error = %error, "existing agent call failed");
                AgentResponse::new("")
                    .with_metadata("error", Value::Bool(true))
                    .with_metadata("error_message", Value::String(error))
            }
        };
        response.processing_time = started.elapsed();
        Ok(response)
    }
}
