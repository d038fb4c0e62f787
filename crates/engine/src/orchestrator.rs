//! 编排 Agent：根据最后一条消息选择应答的参与者。

use std::sync::Arc;

use colloquy_core::{Message, Provider};
use tracing::{debug, info};

use crate::Result;
use crate::agent::Agent;

/// 编排 Agent 的默认名称。
pub const DEFAULT_ORCHESTRATOR_NAME: &str = "Orchestrator";

/// 编排 Agent 表示“没有合适 Agent”的回复。
pub const NO_AGENT_TOKEN: &str = "None";

#[derive(Debug, Clone)]
pub struct Orchestrator {
    agent: Arc<Agent>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::named(DEFAULT_ORCHESTRATOR_NAME, provider)
    }

    pub fn named(name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        Self {
            agent: Arc::new(Agent::new(name, provider)),
        }
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    /// 编排 Agent 在总线上的注册项。
    pub fn agent(&self) -> Arc<Agent> {
        Arc::clone(&self.agent)
    }

    /// 渲染候选 Agent 的名称与系统指令，自身条目除外。
    pub fn build_system_message(&self, agents: &[Arc<Agent>]) -> String {
        let descriptions: Vec<String> = agents
            .iter()
            .filter(|agent| agent.name() != self.name())
            .map(|agent| format!("- {}: {}", agent.name(), agent.system_message()))
            .collect();

        format!(
            "You are an orchestration agent. Your role is to decide which agent should handle the user's request.\n\
             You have the following agents available:\n\
             {}\n\n\
             Based on the last user's message, you must respond with ONLY the name of the agent that should handle the request.\n\
             If no agent is suitable, you should respond with \"{NO_AGENT_TOKEN}\".\n",
            descriptions.join("\n")
        )
    }

    /// 让编排 Agent 基于最后一条消息做出选择。
    ///
    /// 回复（去除首尾空白后）必须与某个候选 Agent 名称完全一致；否则返回
    /// `None`，表示没有合适的应答者，这不是错误。
    pub async fn choose(&self, history: &[Message], agents: &[Arc<Agent>]) -> Result<Option<String>> {
        let system_message = self.build_system_message(agents);
        let last: Vec<Message> = history.last().cloned().into_iter().collect();

        let response = self
            .agent
            .provider()
            .generate_timed(&last, &system_message, "")
            .await?;
        let choice = response.content.trim();

        if choice == NO_AGENT_TOKEN {
            info!(orchestrator = %self.name(), "orchestrator found no suitable agent");
            return Ok(None);
        }

        let selected = agents
            .iter()
            .filter(|agent| agent.name() != self.name())
            .find(|agent| agent.name() == choice)
            .map(|agent| agent.name().to_string());

        match &selected {
            Some(name) => info!(orchestrator = %self.name(), agent = %name, "orchestrator selected agent"),
            None => debug!(orchestrator = %self.name(), choice, "orchestrator choice matches no agent"),
        }
        Ok(selected)
    }
}
