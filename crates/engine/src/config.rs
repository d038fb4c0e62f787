use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colloquy_core::Provider;
use serde::Deserialize;
use serde_json::Value;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::judge::DEFAULT_JUDGE_NAME;
use crate::orchestrator::DEFAULT_ORCHESTRATOR_NAME;
use crate::providers::{EchoProvider, ScriptedProvider};
use crate::routing::{RoutingPolicy, SentinelMatch};

type Result<T> = anyhow::Result<T>;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    pub orchestrator: Option<OrchestratorConfig>,
    pub judge: Option<JudgeConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
            session: SessionConfig::default(),
            providers: BTreeMap::new(),
            tools: Vec::new(),
            agents: Vec::new(),
            orchestrator: None,
            judge: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("failed to deserialize engine config")
    }

    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter().filter(|agent| agent.enabled)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub policy: RoutingPolicy,
    #[serde(default)]
    pub sentinel_match: SentinelMatch,
}

/// 内置 Provider 的配置，按 `type` 区分。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Scripted {
        #[serde(default)]
        responses: Vec<String>,
    },
    Echo {
        #[serde(default)]
        prefix: String,
    },
}

impl ProviderConfig {
    pub fn build(&self, name: &str) -> Arc<dyn Provider> {
        match self {
            ProviderConfig::Scripted { responses } => {
                Arc::new(ScriptedProvider::new(responses.iter().cloned()).named(name))
            }
            ProviderConfig::Echo { prefix } => Arc::new(EchoProvider::new(prefix.clone()).named(name)),
        }
    }
}

/// 返回固定结果的静态工具。
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub system_message: String,
    #[serde(default)]
    pub ignore_trigger_prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_orchestrator_name")]
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_name")]
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub requirements: Vec<String>,
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn default_enabled() -> bool {
    true
}

fn default_parameters() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

fn default_orchestrator_name() -> String {
    DEFAULT_ORCHESTRATOR_NAME.to_string()
}

fn default_judge_name() -> String {
    DEFAULT_JUDGE_NAME.to_string()
}
