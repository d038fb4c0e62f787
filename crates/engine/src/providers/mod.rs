//! 内置 Provider 实现。
//!
//! 真实模型后端不在引擎范围内，这里只提供脚本化、回显以及包装既有 Agent
//! 三种实现，用于测试与脚本化场景。

mod callable;
mod echo;
mod scripted;

pub use callable::{CallStrategy, CallableProvider, ExistingAgent};
pub use echo::EchoProvider;
pub use scripted::ScriptedProvider;

use colloquy_core::Message;

fn last_content(history: &[Message]) -> &str {
    history.last().map(Message::content).unwrap_or_default()
}
