//! 会话级校验器：在会话主体成功结束后统一执行，逐个记录结果。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use colloquy_core::USER_SENDER;

use crate::session::Session;

/// 校验结果：`Err` 携带失败原因。
pub type ValidationOutcome = std::result::Result<(), String>;

type SessionCheck = dyn Fn(&Session) -> ValidationOutcome + Send + Sync;

#[derive(Clone)]
pub struct Validator {
    name: String,
    check: Arc<SessionCheck>,
}

impl Validator {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Session) -> ValidationOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self, session: &Session) -> ValidationOutcome {
        (self.check)(session)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.name).finish()
    }
}

pub fn agent_not_participating(agent_name: impl Into<String>) -> Validator {
    let agent_name = agent_name.into();
    Validator::new("agent_not_participating", move |session| {
        if session
            .message_history()
            .iter()
            .any(|message| message.sender() == agent_name)
        {
            Err(format!(
                "Agent {agent_name} participated in the conversation when they should not have."
            ))
        } else {
            Ok(())
        }
    })
}

/// 发言数必须严格小于 `max_messages`。
pub fn agent_message_count(agent_name: impl Into<String>, max_messages: usize) -> Validator {
    let agent_name = agent_name.into();
    Validator::new("agent_message_count", move |session| {
        let count = session
            .message_history()
            .iter()
            .filter(|message| message.sender() == agent_name)
            .count();
        if count >= max_messages {
            Err(format!(
                "Agent {agent_name} sent {count} messages, which is not below the threshold of {max_messages}."
            ))
        } else {
            Ok(())
        }
    })
}

pub fn turn_taking() -> Validator {
    Validator::new("turn_taking", |session| {
        match session
            .message_history()
            .windows(2)
            .find(|pair| pair[0].sender() == pair[1].sender())
        {
            Some(pair) => Err(format!("Agent {} sent two messages in a row.", pair[1].sender())),
            None => Ok(()),
        }
    })
}

/// 用户消息与紧随其后的消息之间的间隔不得超过 `threshold`。
pub fn latency_below(threshold: Duration) -> Validator {
    Validator::new("latency_validator", move |session| {
        for pair in session.message_history().windows(2) {
            if pair[0].sender() != USER_SENDER {
                continue;
            }

            let latency = (pair[1].timestamp() - pair[0].timestamp())
                .to_std()
                .unwrap_or_default();
            if latency > threshold {
                return Err(format!(
                    "Latency of {latency:?} between user and agent {} exceeded the threshold of {threshold:?}.",
                    pair[1].sender()
                ));
            }
        }
        Ok(())
    })
}
