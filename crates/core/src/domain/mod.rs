mod error;
mod ids;
mod judge_result;
mod message;
mod provider;
mod score;
mod tool;
mod verdict;

pub use error::DomainError;
pub use ids::{MessageId, SessionId};
pub use judge_result::{JudgeResult, RequirementResult};
pub use message::{
    AgentResponse, IGNORE_SENTINEL, Message, SenderType, TimedAgentResponse, USER_SENDER,
};
pub use provider::{Provider, ProviderError, compose_system_message};
pub use score::Score;
pub use tool::{Tool, ToolCall, ToolError, ToolSchema};
pub use verdict::Verdict;
