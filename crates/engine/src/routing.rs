//! 广播路由策略与放弃发言判定。

use colloquy_core::{AgentResponse, IGNORE_SENTINEL};
use serde::{Deserialize, Serialize};

/// 用户广播消息时选择应答 Agent 的策略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// 注册顺序中的第一个 Agent 直接应答，不做放弃判定。
    #[default]
    FirstResponder,
    /// 按注册顺序依次询问，跳过回复中带有放弃标记的 Agent。
    IgnoreSentinel,
    /// 由编排 Agent 指定应答者。
    OrchestratorAgent,
}

/// 放弃标记的匹配方式，所有调用路径共用同一规则。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelMatch {
    /// 去除首尾空白后包含放弃标记即视为放弃。
    #[default]
    Contains,
    /// 去除首尾空白后与放弃标记完全相同才视为放弃。
    Exact,
}

impl SentinelMatch {
    pub fn abstains(self, content: &str) -> bool {
        let content = content.trim();
        match self {
            SentinelMatch::Contains => content.contains(IGNORE_SENTINEL),
            SentinelMatch::Exact => content == IGNORE_SENTINEL,
        }
    }
}

/// 广播选出的应答者及其回复。
#[derive(Debug, Clone, PartialEq)]
pub struct Responder {
    pub agent_name: String,
    pub response: AgentResponse,
}
