use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use colloquy_core::{AgentResponse, Message, Provider, ProviderError};
use tokio::sync::Mutex;

use super::last_content;

type ResponseFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

enum Script {
    Responses(Vec<String>),
    Function(ResponseFn),
    Failure(String),
}

/// 按脚本回复的 Provider。
///
/// 预设回复按顺序逐条返回，用完后返回空内容；也可以由函数根据最后一条消息
/// 的内容生成回复。会记录调用次数与收到的系统指令。
pub struct ScriptedProvider {
    name: String,
    script: Script,
    cursor: AtomicUsize,
    calls: AtomicUsize,
    system_prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Responses(
            responses.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn from_fn(respond: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::with_script(Script::Function(Arc::new(respond)))
    }

    /// 每次调用都返回 [`ProviderError::Failed`]。
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_script(Script::Failure(reason.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            name: "scripted".to_string(),
            script,
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn system_prompts(&self) -> Vec<String> {
        self.system_prompts.lock().await.clone()
    }
}

impl fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("name", &self.name)
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        history: &[Message],
        system_message: &str,
    ) -> Result<AgentResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.system_prompts
            .lock()
            .await
            .push(system_message.to_string());

        let content = match &self.script {
            Script::Function(respond) => respond(last_content(history)),
            Script::Responses(responses) => {
                let index = self.cursor.fetch_add(1, Ordering::SeqCst);
                responses.get(index).cloned().unwrap_or_default()
            }
            Script::Failure(reason) => return Err(ProviderError::Failed(reason.clone())),
        };
        Ok(AgentResponse::new(content))
    }
}
