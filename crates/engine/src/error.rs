use colloquy_api_types::AssertionResult;
use colloquy_core::{ProviderError, ToolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("Agent 未找到: {0}")]
    AgentNotFound(String),

    #[error("Agent 已注册: {0}")]
    AgentConflict(String),

    #[error("工具未找到: {0}")]
    ToolNotFound(String),

    #[error("工具已注册: {0}")]
    ToolConflict(String),

    #[error("Provider 未找到: {0}")]
    ProviderNotFound(String),

    #[error("会话未找到: {0}")]
    SessionNotFound(String),

    #[error("Provider 调用失败: {0}")]
    Provider(#[from] ProviderError),

    #[error("工具执行失败: {0}")]
    Tool(#[from] ToolError),

    #[error("断言失败 ({}): {}", .0.assertion_name, .0.description.as_deref().unwrap_or("未提供原因"))]
    Assertion(Box<AssertionResult>),

    #[error("校验失败:\n{}", .0.join("\n"))]
    ValidationFailed(Vec<String>),

    #[error("Judge 判定失败: {0}")]
    JudgeRejected(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML 错误: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 错误大类，供调用方按传播策略区分处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Upstream,
    Assertion,
    Validation,
    Config,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::AgentNotFound(_)
            | EngineError::ToolNotFound(_)
            | EngineError::ProviderNotFound(_)
            | EngineError::SessionNotFound(_) => ErrorKind::NotFound,
            EngineError::AgentConflict(_) | EngineError::ToolConflict(_) => ErrorKind::Conflict,
            EngineError::Provider(_) | EngineError::Tool(_) => ErrorKind::Upstream,
            EngineError::Assertion(_) => ErrorKind::Assertion,
            EngineError::ValidationFailed(_) | EngineError::JudgeRejected(_) => {
                ErrorKind::Validation
            }
            EngineError::Config(_) | EngineError::Toml(_) => ErrorKind::Config,
            EngineError::Io(_) | EngineError::Json(_) | EngineError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
