//! 会话：驱动一次测试对话，串联总线、路由策略、断言、校验器与 Judge。

use std::sync::Arc;

use colloquy_api_types::{AssertionResult, ValidatorResult};
use colloquy_core::{AgentResponse, JudgeResult, Message, SenderType, SessionId};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::assertions::MessageAssertion;
use crate::bus::Bus;
use crate::events::{ConversationEvent, EventBroadcaster, EventStream};
use crate::judge::{Judge, TranscriptSource, render_transcript};
use crate::orchestrator::Orchestrator;
use crate::routing::{Responder, RoutingPolicy, SentinelMatch};
use crate::validators::Validator;
use crate::{EngineError, Result};

mod evidence;

pub use evidence::JUDGE_EXECUTION_ERROR;

/// 构造会话所需的全部参数。
#[derive(Debug, Default)]
pub struct SessionOptions {
    pub session_id: Option<SessionId>,
    /// 直接注册到总线的 Agent。
    pub agents: Vec<Arc<Agent>>,
    /// 由 Harness 按名称解析的 Agent，为空时使用全部已创建的 Agent。
    pub agent_names: Vec<String>,
    pub assertions: Vec<MessageAssertion>,
    pub validators: Vec<Validator>,
    pub orchestrator: Option<Orchestrator>,
    pub policy: RoutingPolicy,
    pub sentinel_match: SentinelMatch,
    pub judge: Option<Judge>,
}

pub struct Session {
    id: SessionId,
    bus: Bus,
    assertions: Vec<MessageAssertion>,
    orchestrator: Option<Orchestrator>,
    policy: RoutingPolicy,
    sentinel_match: SentinelMatch,
    validators: Vec<Validator>,
    judge: Option<Judge>,
    assertion_results: Vec<AssertionResult>,
    validator_results: Vec<ValidatorResult>,
    judge_result: Option<JudgeResult>,
    events: Arc<EventBroadcaster>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Result<Self> {
        Self::with_event_broadcaster(options, Arc::new(EventBroadcaster::default()))
    }

    /// 创建会话并注册参与者，编排 Agent 最后注册。
    ///
    /// `OrchestratorAgent` 策略缺少编排 Agent 时返回配置错误。
    pub fn with_event_broadcaster(
        options: SessionOptions,
        events: Arc<EventBroadcaster>,
    ) -> Result<Self> {
        if options.policy == RoutingPolicy::OrchestratorAgent && options.orchestrator.is_none() {
            return Err(EngineError::Config(
                "orchestrator_agent 策略需要配置编排 Agent".to_string(),
            ));
        }

        let mut bus = Bus::new();
        for agent in options.agents {
            bus.register_agent(agent)?;
        }
        if let Some(orchestrator) = &options.orchestrator {
            bus.register_agent(orchestrator.agent())?;
        }

        let session = Self {
            id: options.session_id.unwrap_or_default(),
            bus,
            assertions: options.assertions,
            orchestrator: options.orchestrator,
            policy: options.policy,
            sentinel_match: options.sentinel_match,
            validators: options.validators,
            judge: options.judge,
            assertion_results: Vec::new(),
            validator_results: Vec::new(),
            judge_result: None,
            events,
        };

        info!(
            session_id = %session.id,
            policy = ?session.policy,
            agents = session.bus.agents().len(),
            "session created"
        );
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn message_history(&self) -> &[Message] {
        self.bus.history()
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    pub fn sentinel_match(&self) -> SentinelMatch {
        self.sentinel_match
    }

    pub fn orchestrator(&self) -> Option<&Orchestrator> {
        self.orchestrator.as_ref()
    }

    pub fn subscribe_events(&self) -> EventStream {
        self.events.subscribe()
    }

    pub fn add_participant(&mut self, agent: impl Into<Arc<Agent>>) -> Result<()> {
        self.bus.register_agent(agent)
    }

    pub fn add_assertion(&mut self, assertion: MessageAssertion) {
        self.assertions.push(assertion);
    }

    pub fn add_validator(&mut self, validator: Validator) {
        self.validators.push(validator);
    }

    pub fn set_judge(&mut self, judge: Judge) {
        self.judge = Some(judge);
    }

    /// 追加任意消息并广播 `MessageAppended` 事件。
    pub fn append_message(&mut self, message: Message) -> &Message {
        let message = self.bus.add_message(message);
        self.events.emit(ConversationEvent::MessageAppended {
            session_id: self.id,
            message_id: message.id(),
            sender: message.sender().to_string(),
            sender_type: message.sender_type(),
        });
        message
    }

    pub fn user_says(&mut self, text: impl Into<String>) -> &mut Self {
        self.append_message(Message::user(text));
        self
    }

    /// Agent 之间的直接发言，不触发生成。
    pub fn agent_says(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> &mut Self {
        self.append_message(Message::agent(from, text).addressed_to(to, SenderType::Agent));
        self
    }

    /// 让指定 Agent 基于当前完整历史回复。
    ///
    /// 放弃发言时返回 `Ok(None)` 且不追加消息；否则追加回复并依次执行消息断言，
    /// 第一个失败的断言被记录后立即返回错误，已追加的回复保留在历史中。
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn agent_responds(&mut self, agent_name: &str) -> Result<Option<AgentResponse>> {
        self.respond(agent_name, None).await
    }

    /// 追加一条用户消息，并按会话的路由策略选出至多一个应答者。
    #[tracing::instrument(skip(self, text), fields(session_id = %self.id, policy = ?self.policy))]
    pub async fn user_says_and_broadcast(
        &mut self,
        text: impl Into<String>,
    ) -> Result<Option<Responder>> {
        self.user_says(text);

        let responder = match self.policy {
            RoutingPolicy::FirstResponder => self.broadcast_first_responder().await?,
            RoutingPolicy::IgnoreSentinel => self.broadcast_ignore_sentinel().await?,
            RoutingPolicy::OrchestratorAgent => self.broadcast_orchestrated().await?,
        };

        info!(
            responder = responder.as_ref().map(|r| r.agent_name.as_str()).unwrap_or("<none>"),
            "broadcast routed"
        );
        self.events.emit(ConversationEvent::ResponderSelected {
            session_id: self.id,
            policy: self.policy,
            agent_name: responder.as_ref().map(|r| r.agent_name.clone()),
        });
        Ok(responder)
    }

    /// 两个 Agent 轮流发言，最多 `max_turns` 个来回，任一方放弃即停止。
    ///
    /// 返回本次对话追加到总线上的发言（含种子消息），工具调用消息除外。
    #[tracing::instrument(skip(self, initial_message), fields(session_id = %self.id))]
    pub async fn run_agent_conversation(
        &mut self,
        initiator: &str,
        responder: &str,
        initial_message: impl Into<String>,
        max_turns: usize,
    ) -> Result<Vec<Message>> {
        let seed = Message::agent(initiator, initial_message)
            .addressed_to(responder, SenderType::Agent)
            .with_metadata(to_agent(responder));
        let mut log = vec![self.append_message(seed).clone()];

        for turn in 0..max_turns {
            for (speaker, listener) in [(responder, initiator), (initiator, responder)] {
                if self.respond(speaker, Some(listener)).await?.is_none() {
                    debug!(turn, agent = speaker, "conversation ended by abstention");
                    return Ok(log);
                }
                if let Some(message) = self.bus.last_message() {
                    log.push(message.clone());
                }
            }
        }

        Ok(log)
    }

    async fn respond(
        &mut self,
        agent_name: &str,
        addressee: Option<&str>,
    ) -> Result<Option<AgentResponse>> {
        let agent = self.bus.get_agent(agent_name)?;
        let response = self.generate(&agent).await?;

        if self.abstained(agent_name, &response) {
            return Ok(None);
        }

        self.append_reply(agent_name, addressee, &response)?;
        Ok(Some(response))
    }

    async fn broadcast_first_responder(&mut self) -> Result<Option<Responder>> {
        let Some(agent) = self.candidates().into_iter().next() else {
            return Ok(None);
        };

        let response = self.generate(&agent).await?;
        self.append_reply(agent.name(), None, &response)?;
        Ok(Some(Responder {
            agent_name: agent.name().to_string(),
            response,
        }))
    }

    async fn broadcast_ignore_sentinel(&mut self) -> Result<Option<Responder>> {
        for agent in self.candidates() {
            let response = self.generate(&agent).await?;
            if self.abstained(agent.name(), &response) {
                continue;
            }

            self.append_reply(agent.name(), None, &response)?;
            return Ok(Some(Responder {
                agent_name: agent.name().to_string(),
                response,
            }));
        }

        Ok(None)
    }

    async fn broadcast_orchestrated(&mut self) -> Result<Option<Responder>> {
        let orchestrator = self.orchestrator.clone().ok_or_else(|| {
            EngineError::Config("orchestrator_agent 策略需要配置编排 Agent".to_string())
        })?;

        let Some(agent_name) = orchestrator
            .choose(self.bus.history(), self.bus.agents())
            .await?
        else {
            return Ok(None);
        };

        Ok(self
            .respond(&agent_name, None)
            .await?
            .map(|response| Responder {
                agent_name,
                response,
            }))
    }

    /// 按注册顺序排列的候选应答者，编排 Agent 自身除外。
    fn candidates(&self) -> Vec<Arc<Agent>> {
        let orchestrator = self.orchestrator.as_ref().map(Orchestrator::name);
        self.bus
            .agents()
            .iter()
            .filter(|agent| Some(agent.name()) != orchestrator)
            .cloned()
            .collect()
    }

    /// 生成回复，并为工具循环追加到总线上的消息补发事件。
    async fn generate(&mut self, agent: &Agent) -> Result<AgentResponse> {
        let before = self.bus.len();
        let result = agent.generate_response(&mut self.bus).await;

        for message in &self.bus.history()[before..] {
            self.events.emit(ConversationEvent::MessageAppended {
                session_id: self.id,
                message_id: message.id(),
                sender: message.sender().to_string(),
                sender_type: message.sender_type(),
            });
        }
        result
    }

    fn abstained(&self, agent_name: &str, response: &AgentResponse) -> bool {
        if !self.sentinel_match.abstains(&response.content) {
            return false;
        }

        debug!(agent = agent_name, "agent abstained");
        self.events.emit(ConversationEvent::AgentAbstained {
            session_id: self.id,
            agent_name: agent_name.to_string(),
        });
        true
    }

    /// 追加 Agent 回复并执行消息断言，遇到第一个失败即返回。
    fn append_reply(
        &mut self,
        agent_name: &str,
        addressee: Option<&str>,
        response: &AgentResponse,
    ) -> Result<()> {
        let mut metadata = response.metadata.clone();
        let mut message = Message::agent(agent_name, response.content.clone());
        if let Some(addressee) = addressee {
            metadata.extend(to_agent(addressee));
            message = message.addressed_to(addressee, SenderType::Agent);
        }
        let message = self.append_message(message.with_metadata(metadata)).clone();

        if self.assertions.is_empty() {
            return Ok(());
        }

        let serialized = serde_json::to_value(&message)?;
        let assertions = self.assertions.clone();
        for assertion in &assertions {
            let mut evidence = Map::new();
            evidence.insert("message".to_string(), serialized.clone());
            self.record_assertion(assertion.name(), assertion.call(&message), evidence)?;
        }
        Ok(())
    }
}

impl TranscriptSource for Session {
    fn conversation_text(&self) -> String {
        render_transcript(self.bus.history())
    }
}

impl Session {
    /// 每行一条 `"{sender}: {content}"`。
    pub fn conversation_text(&self) -> String {
        TranscriptSource::conversation_text(self)
    }
}

fn to_agent(name: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("to_agent".to_string(), Value::String(name.to_string()));
    metadata
}
