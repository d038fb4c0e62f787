//! 测试上下文：集中持有配置、Provider、工具、Agent 与本次测试创建的会话。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use colloquy_api_types::{Participant, ParticipantKind, TestReport, TestStatus};
use colloquy_core::{Provider, SessionId, Tool, USER_SENDER};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::assertions::MessageAssertion;
use crate::config::{AgentConfig, EngineConfig};
use crate::events::{EventBroadcaster, EventStream};
use crate::judge::Judge;
use crate::orchestrator::Orchestrator;
use crate::session::{Session, SessionOptions};
use crate::tool::{StaticTool, ToolHandle};
use crate::{EngineError, Result};

pub struct Harness {
    config: Arc<EngineConfig>,
    events: Arc<EventBroadcaster>,
    providers: BTreeMap<String, Arc<dyn Provider>>,
    tools: HashMap<String, Arc<ToolHandle>>,
    agents: Vec<Arc<Agent>>,
    sessions: Vec<Session>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Arc::new(EngineConfig::default()))
    }

    /// 按配置构建 Provider、静态工具与已启用的 Agent。
    pub fn from_config(config: impl Into<Arc<EngineConfig>>) -> Result<Self> {
        let mut harness = Self::with_config(config.into());
        let config = Arc::clone(&harness.config);

        info!(
            event_buffer_size = config.event_buffer_size,
            providers = config.providers.len(),
            agent_count = config.agents.len(),
            "initializing harness"
        );

        for tool in &config.tools {
            harness.create_tool(StaticTool::new(
                &tool.name,
                &tool.description,
                tool.parameters.clone(),
                tool.result.clone(),
            ))?;
        }
        for agent in config.enabled_agents() {
            harness.agent_from_config(agent)?;
        }
        Ok(harness)
    }

    fn with_config(config: Arc<EngineConfig>) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|(name, provider)| (name.clone(), provider.build(name)))
            .collect();

        Self {
            events: EventBroadcaster::shared(config.event_buffer_size),
            config,
            providers,
            tools: HashMap::new(),
            agents: Vec::new(),
            sessions: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> EventStream {
        self.events.subscribe()
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ProviderNotFound(name.to_string()))
    }

    /// 注册外部 Provider，同名时覆盖配置中的定义。
    pub fn register_provider(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// 注册工具，名称在测试上下文中唯一。
    pub fn create_tool(&mut self, tool: impl Tool + 'static) -> Result<Arc<ToolHandle>> {
        let handle = Arc::new(ToolHandle::new(tool));
        if self.tools.contains_key(handle.name()) {
            return Err(EngineError::ToolConflict(handle.name().to_string()));
        }

        debug!(tool = %handle.name(), "tool created");
        self.tools
            .insert(handle.name().to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    pub fn get_tool(&self, name: &str) -> Result<Arc<ToolHandle>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ToolNotFound(name.to_string()))
    }

    /// 创建 Agent，同名 Agent 会被替换；工具按名称从注册表解析。
    pub fn create_agent(
        &mut self,
        name: &str,
        provider: Arc<dyn Provider>,
        system_message: &str,
        ignore_trigger_prompt: &str,
        tool_names: &[String],
    ) -> Result<Arc<Agent>> {
        let tools = tool_names
            .iter()
            .map(|tool| self.get_tool(tool))
            .collect::<Result<Vec<_>>>()?;

        let agent = Arc::new(
            Agent::new(name, provider)
                .with_system_message(system_message)
                .with_ignore_trigger_prompt(ignore_trigger_prompt)
                .with_tools(tools),
        );

        match self.agents.iter().position(|existing| existing.name() == name) {
            Some(index) => {
                debug!(agent = name, "replacing existing agent");
                self.agents[index] = Arc::clone(&agent);
            }
            None => self.agents.push(Arc::clone(&agent)),
        }

        info!(agent = name, provider = %agent.provider().name(), "agent created");
        Ok(agent)
    }

    pub fn agent_from_config(&mut self, config: &AgentConfig) -> Result<Arc<Agent>> {
        let provider = self.provider(&config.provider)?;
        self.create_agent(
            &config.name,
            provider,
            &config.system_message,
            &config.ignore_trigger_prompt,
            &config.tools,
        )
    }

    pub fn get_agent(&self, name: &str) -> Result<Arc<Agent>> {
        self.agents
            .iter()
            .find(|agent| agent.name() == name)
            .cloned()
            .ok_or_else(|| EngineError::AgentNotFound(name.to_string()))
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// 创建会话。未指定任何 Agent 时注册全部已创建的 Agent。
    #[tracing::instrument(skip(self, options))]
    pub fn create_session(&mut self, mut options: SessionOptions) -> Result<&mut Session> {
        if options.agents.is_empty() && options.agent_names.is_empty() {
            options.agents = self.agents.clone();
        } else {
            for name in std::mem::take(&mut options.agent_names) {
                options.agents.push(self.get_agent(&name)?);
            }
        }

        let session = Session::with_event_broadcaster(options, Arc::clone(&self.events))?;
        info!(session_id = %session.id(), "session registered with harness");

        let index = self.sessions.len();
        self.sessions.push(session);
        Ok(&mut self.sessions[index])
    }

    /// 按配置中的路由策略、编排 Agent 与 Judge 创建会话。
    pub fn session_from_config(&mut self) -> Result<&mut Session> {
        let config = Arc::clone(&self.config);

        let orchestrator = match &config.orchestrator {
            Some(orchestrator) => Some(Orchestrator::named(
                &orchestrator.name,
                self.provider(&orchestrator.provider)?,
            )),
            None => None,
        };
        let judge = match &config.judge {
            Some(judge) => Some(
                Judge::with_requirements(self.provider(&judge.provider)?, judge.requirements.clone())
                    .named(&judge.name),
            ),
            None => None,
        };

        self.create_session(SessionOptions {
            orchestrator,
            judge,
            policy: config.session.policy,
            sentinel_match: config.session.sentinel_match,
            ..SessionOptions::default()
        })
    }

    /// 向已有会话追加参与者与消息断言，已在总线上的 Agent 会被跳过。
    pub fn extend_session(
        &mut self,
        id: SessionId,
        agent_names: &[&str],
        assertions: Vec<MessageAssertion>,
    ) -> Result<&mut Session> {
        let agents = agent_names
            .iter()
            .map(|name| self.get_agent(name))
            .collect::<Result<Vec<_>>>()?;

        let session = self.session_mut(id)?;
        for agent in agents {
            if !session.bus().contains_agent(agent.name()) {
                session.add_participant(agent)?;
            }
        }
        for assertion in assertions {
            session.add_assertion(assertion);
        }
        Ok(session)
    }

    pub fn session(&self, id: SessionId) -> Result<&Session> {
        self.sessions
            .iter()
            .find(|session| session.id() == id)
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    pub fn session_mut(&mut self, id: SessionId) -> Result<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|session| session.id() == id)
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// 依次结束全部会话，汇总所有校验与 Judge 失败。
    pub async fn conclude(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for session in &mut self.sessions {
            match session.conclude().await {
                Ok(()) => {}
                Err(EngineError::ValidationFailed(session_failures)) => {
                    failures.extend(session_failures);
                }
                Err(err) => return Err(err),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ValidationFailed(failures))
        }
    }

    /// 生成测试报告，参与者取自全部会话消息的发送方与接收方。
    pub fn report(
        &self,
        test_name: impl Into<String>,
        status: TestStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TestReport {
        let mut names: Vec<&str> = self
            .sessions
            .iter()
            .flat_map(|session| session.message_history())
            .flat_map(|message| std::iter::once(message.sender()).chain(message.receiver()))
            .collect();
        names.sort_unstable();
        names.dedup();

        TestReport {
            test_name: test_name.into(),
            start_time: start.to_rfc3339(),
            end_time: end.to_rfc3339(),
            status,
            participants: names.into_iter().map(|name| self.participant(name)).collect(),
            sessions: self.sessions.iter().map(Session::report).collect(),
        }
    }

    fn participant(&self, name: &str) -> Participant {
        let mut metadata = Map::new();
        let kind = if name == USER_SENDER {
            ParticipantKind::User
        } else if self.tools.contains_key(name) {
            ParticipantKind::Tool
        } else {
            if let Ok(agent) = self.get_agent(name) {
                metadata.insert(
                    "model".to_string(),
                    Value::String(agent.provider().name().to_string()),
                );
            }
            ParticipantKind::Agent
        };

        Participant {
            id: name.to_string(),
            name: name.to_string(),
            kind,
            metadata,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::providers::ScriptedProvider;

    fn scripted(responses: &[&str]) -> Arc<dyn Provider> {
        Arc::new(ScriptedProvider::new(responses.iter().copied()))
    }

    #[test]
    fn duplicate_tool_is_a_conflict() {
        let mut harness = Harness::new();
        harness
            .create_tool(StaticTool::new("calc", "", json!({}), json!(4)))
            .expect("first tool should register");

        let err = harness
            .create_tool(StaticTool::new("calc", "", json!({}), json!(5)))
            .expect_err("duplicate tool should fail");

        assert!(matches!(err, EngineError::ToolConflict(name) if name == "calc"));
    }

    #[test]
    fn unknown_tool_name_fails_agent_creation() {
        let mut harness = Harness::new();

        let err = harness
            .create_agent("Alice", scripted(&[]), "", "", &["missing".to_string()])
            .expect_err("unknown tool should fail");

        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        assert!(harness.agents().is_empty());
    }

    #[test]
    fn create_agent_replaces_same_name() {
        let mut harness = Harness::new();
        harness
            .create_agent("Alice", scripted(&[]), "first", "", &[])
            .expect("agent should build");
        harness
            .create_agent("Alice", scripted(&[]), "second", "", &[])
            .expect("agent should build");

        assert_eq!(harness.agents().len(), 1);
        assert_eq!(harness.agents()[0].system_message(), "second");
    }

    #[tokio::test]
    async fn extend_session_skips_registered_agents() {
        let mut harness = Harness::new();
        harness
            .create_agent("Alice", scripted(&["hi"]), "", "", &[])
            .expect("agent should build");
        harness
            .create_agent("Bob", scripted(&["yo"]), "", "", &[])
            .expect("agent should build");

        let id = harness
            .create_session(SessionOptions {
                agent_names: vec!["Alice".to_string()],
                ..SessionOptions::default()
            })
            .expect("session should build")
            .id();

        let session = harness
            .extend_session(id, &["Alice", "Bob"], Vec::new())
            .expect("extension should succeed");
        assert_eq!(session.bus().agents().len(), 2);

        session.user_says("hello");
        session.agent_responds("Bob").await.expect("Bob should reply");

        let report = harness.report("extend", TestStatus::Passed, Utc::now(), Utc::now());
        let kinds: Vec<(&str, ParticipantKind)> = report
            .participants
            .iter()
            .map(|p| (p.name.as_str(), p.kind))
            .collect();
        assert_eq!(
            kinds,
            [("Bob", ParticipantKind::Agent), ("user", ParticipantKind::User)]
        );
        assert_eq!(report.participants[0].metadata["model"], "scripted");
    }

    #[test]
    fn missing_session_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .session(SessionId::new())
            .err()
            .expect("no sessions exist");
        assert!(matches!(err, EngineError::SessionNotFound(_)));
    }
}
