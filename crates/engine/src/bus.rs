//! 会话消息总线：有序、只追加的消息日志与 Agent 注册表。

use std::sync::Arc;

use colloquy_core::Message;
use tracing::debug;

use crate::agent::Agent;
use crate::judge::{TranscriptSource, render_transcript};
use crate::{EngineError, Result};

/// 单个会话独占的消息总线。
///
/// 总线假定调用方串行访问；若跨线程共享，写入方必须自行串行化。
#[derive(Default)]
pub struct Bus {
    messages: Vec<Message>,
    agents: Vec<Arc<Agent>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 Agent，同名重复注册返回 [`EngineError::AgentConflict`]。
    pub fn register_agent(&mut self, agent: impl Into<Arc<Agent>>) -> Result<()> {
        let agent = agent.into();
        if self.contains_agent(agent.name()) {
            return Err(EngineError::AgentConflict(agent.name().to_string()));
        }

        debug!(agent = %agent.name(), "registering agent on bus");
        self.agents.push(agent);
        Ok(())
    }

    pub fn get_agent(&self, name: &str) -> Result<Arc<Agent>> {
        self.agents
            .iter()
            .find(|agent| agent.name() == name)
            .cloned()
            .ok_or_else(|| EngineError::AgentNotFound(name.to_string()))
    }

    pub fn contains_agent(&self, name: &str) -> bool {
        self.agents.iter().any(|agent| agent.name() == name)
    }

    /// 按注册顺序返回全部 Agent。
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// 追加消息并返回其在日志中的引用。
    ///
    /// 时间戳早于上一条消息时会被抬升到上一条的时间戳，保证日志时间单调。
    pub fn add_message(&mut self, message: Message) -> &Message {
        let message = match self.messages.last() {
            Some(last) if message.timestamp() < last.timestamp() => {
                message.with_timestamp(last.timestamp())
            }
            _ => message,
        };

        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl TranscriptSource for Bus {
    fn conversation_text(&self) -> String {
        render_transcript(&self.messages)
    }
}
