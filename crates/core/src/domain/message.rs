use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MessageId;

/// Reserved literal an agent emits to abstain from a turn.
pub const IGNORE_SENTINEL: &str = "IGNORE_MESSAGE";

/// Sender id used for every user utterance.
pub const USER_SENDER: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Agent,
    Tool,
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderType::User => write!(f, "user"),
            SenderType::Agent => write!(f, "agent"),
            SenderType::Tool => write!(f, "tool"),
        }
    }
}

/// One utterance in a conversation. Immutable once built; the builder
/// methods consume `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    content: String,
    sender: String,
    sender_type: SenderType,
    #[serde(default)]
    receiver: Option<String>,
    #[serde(default)]
    receiver_type: Option<SenderType>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl Message {
    pub fn new(
        content: impl Into<String>,
        sender: impl Into<String>,
        sender_type: SenderType,
    ) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            sender: sender.into(),
            sender_type,
            receiver: None,
            receiver_type: None,
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, USER_SENDER, SenderType::User)
    }

    pub fn agent(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(content, sender, SenderType::Agent)
    }

    pub fn tool(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(content, sender, SenderType::Tool)
    }

    pub fn addressed_to(mut self, receiver: impl Into<String>, receiver_type: SenderType) -> Self {
        self.receiver = Some(receiver.into());
        self.receiver_type = Some(receiver_type);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn sender_type(&self) -> SenderType {
        self.sender_type
    }

    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    pub fn receiver_type(&self) -> Option<SenderType> {
        self.receiver_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

/// What a provider produced for one generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub content: String,
    pub metadata: Map<String, Value>,
    pub processing_time: Duration,
    /// Provider-specific payload, kept for diagnostics only.
    pub raw_response: Option<Value>,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_raw_response(mut self, raw: Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// An [`AgentResponse`] whose `processing_time` is the measured wall-clock
/// latency of the generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedAgentResponse {
    response: AgentResponse,
}

impl TimedAgentResponse {
    pub fn new(mut response: AgentResponse, latency: Duration) -> Self {
        response.processing_time = latency;
        Self { response }
    }

    pub fn latency(&self) -> Duration {
        self.response.processing_time
    }

    pub fn into_response(self) -> AgentResponse {
        self.response
    }
}

impl Deref for TimedAgentResponse {
    type Target = AgentResponse;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}

impl From<TimedAgentResponse> for AgentResponse {
    fn from(value: TimedAgentResponse) -> Self {
        value.into_response()
    }
}
