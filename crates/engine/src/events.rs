use std::sync::Arc;

use anyhow::Result;
use colloquy_api_types::{AssertionStatus, ValidatorStatus};
use colloquy_core::{MessageId, Score, SenderType, SessionId, Verdict};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::routing::RoutingPolicy;

/// 会话对外广播的事件类型。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// 消息已追加到会话总线。
    MessageAppended {
        session_id: SessionId,
        message_id: MessageId,
        sender: String,
        sender_type: SenderType,
    },
    /// Agent 放弃了本轮发言。
    AgentAbstained {
        session_id: SessionId,
        agent_name: String,
    },
    /// 广播路由完成，`agent_name` 为空表示无人应答。
    ResponderSelected {
        session_id: SessionId,
        policy: RoutingPolicy,
        agent_name: Option<String>,
    },
    /// 断言结果已记录。
    AssertionRecorded {
        session_id: SessionId,
        assertion_id: String,
        assertion_name: String,
        status: AssertionStatus,
    },
    /// 校验器结果已记录。
    ValidatorRecorded {
        session_id: SessionId,
        name: String,
        status: ValidatorStatus,
    },
    /// Judge 已给出结论。
    JudgeCompleted {
        session_id: SessionId,
        verdict: Verdict,
        score: Score,
    },
}

/// 默认事件队列容量。
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1_000;

/// 基于 `tokio::broadcast` 的事件广播器。
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ConversationEvent>,
}

impl EventBroadcaster {
    /// 创建事件广播器。
    ///
    /// `capacity` 表示内部广播队列容量。
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// 广播一个事件，没有订阅者时直接丢弃。
    pub fn emit(&self, event: ConversationEvent) {
        let _ = self.sender.send(event);
    }

    /// 订阅事件流。
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

/// 事件接收流包装器。
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<ConversationEvent>,
}

impl EventStream {
    /// 异步接收下一条事件。
    pub async fn recv(&mut self) -> Result<ConversationEvent> {
        Ok(self.receiver.recv().await?)
    }

    /// 非阻塞尝试接收一条事件。
    pub fn try_recv(&mut self) -> Result<ConversationEvent> {
        Ok(self.receiver.try_recv()?)
    }

    /// 取出当前已缓冲的全部事件。
    pub fn drain(&mut self) -> Vec<ConversationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}
