//! 断言：消息级断言在每条回复追加后立即执行，会话级断言按需手动执行。

use std::fmt;
use std::sync::{Arc, LazyLock};

use colloquy_core::Message;
use regex::{Regex, RegexBuilder};

use crate::session::Session;

/// 断言结果：`Ok` 携带可选的通过说明，`Err` 携带失败原因。
pub type CheckResult = std::result::Result<Option<String>, String>;

type MessageCheck = dyn Fn(&Message) -> CheckResult + Send + Sync;
type SessionCheck = dyn Fn(&Session) -> CheckResult + Send + Sync;

/// 作用于单条消息的具名断言。
#[derive(Clone)]
pub struct MessageAssertion {
    name: String,
    check: Arc<MessageCheck>,
}

impl MessageAssertion {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Message) -> CheckResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, message: &Message) -> CheckResult {
        (self.check)(message)
    }
}

impl fmt::Debug for MessageAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageAssertion").field(&self.name).finish()
    }
}

/// 作用于整个会话的具名断言。
#[derive(Clone)]
pub struct SessionAssertion {
    name: String,
    check: Arc<SessionCheck>,
}

impl SessionAssertion {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Session) -> CheckResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, session: &Session) -> CheckResult {
        (self.check)(session)
    }
}

impl fmt::Debug for SessionAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionAssertion").field(&self.name).finish()
    }
}

pub fn contains_text(pattern: impl Into<String>) -> MessageAssertion {
    let pattern = pattern.into();
    MessageAssertion::new("contains_text", move |message| {
        if message.content().contains(&pattern) {
            Ok(None)
        } else {
            Err(format!("Text '{pattern}' not found in response"))
        }
    })
}

/// 非法的正则表达式不会在构造时报错，而是让断言在执行时失败。
pub fn matches_regex(pattern: impl Into<String>) -> MessageAssertion {
    let pattern = pattern.into();
    let compiled = Regex::new(&pattern).map_err(|err| err.to_string());
    MessageAssertion::new("matches_regex", move |message| match &compiled {
        Ok(regex) if regex.is_match(message.content()) => Ok(None),
        Ok(_) => Err(format!("Pattern '{pattern}' not found in response")),
        Err(err) => Err(format!("Invalid pattern '{pattern}': {err}")),
    })
}

static UNPROFESSIONAL: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [r"\blol\b", r"\bwtf\b", r"\bomg\b", r"\bur\b", r"\bu r\b"]
        .into_iter()
        .filter_map(|pattern| Regex::new(pattern).ok().map(|regex| (pattern, regex)))
        .collect()
});

pub fn professional_tone() -> MessageAssertion {
    MessageAssertion::new("professional_tone", |message| {
        let content = message.content().to_lowercase();
        let found: Vec<&str> = UNPROFESSIONAL
            .iter()
            .filter(|(_, regex)| regex.is_match(&content))
            .map(|(pattern, _)| *pattern)
            .collect();

        if found.is_empty() {
            Ok(None)
        } else {
            Err(format!(
                "Unprofessional language detected: {}",
                found.join(", ")
            ))
        }
    })
}

static HALLUCINATION_MARKERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        "I don't have access to",
        "I cannot browse",
        "As an AI",
        "As an assistant",
        "I'm not able to",
    ]
    .into_iter()
    .filter_map(|marker| {
        RegexBuilder::new(&regex::escape(marker))
            .case_insensitive(true)
            .build()
            .ok()
            .map(|regex| (marker, regex))
    })
    .collect()
});

pub fn no_hallucination_markers() -> MessageAssertion {
    MessageAssertion::new("no_hallucination_markers", |message| {
        match HALLUCINATION_MARKERS
            .iter()
            .find(|(_, regex)| regex.is_match(message.content()))
        {
            Some((marker, _)) => Err(format!("Potential hallucination marker found: {marker}")),
            None => Ok(None),
        }
    })
}

pub fn agent_participated(agent_name: impl Into<String>) -> SessionAssertion {
    let agent_name = agent_name.into();
    SessionAssertion::new("agent_participated", move |session| {
        if session
            .message_history()
            .iter()
            .any(|message| message.sender() == agent_name)
        {
            Ok(Some(format!("Agent '{agent_name}' participated in conversation")))
        } else {
            Err(format!("Agent '{agent_name}' did not participate in conversation"))
        }
    })
}
