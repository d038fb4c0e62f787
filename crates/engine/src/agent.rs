//! Agent 与单跳工具调用循环。

use std::fmt;
use std::sync::Arc;

use colloquy_core::{AgentResponse, Message, Provider, SenderType, ToolSchema};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::Result;
use crate::bus::Bus;
use crate::tool::ToolHandle;

const TOOLS_PREAMBLE: &str = r#"
You have access to the following tools. To use a tool, you must respond with a JSON object with the following structure:
{
    "tool_call": {
        "name": "<tool_name>",
        "parameters": {
            "<parameter_name>": "<parameter_value>"
        }
    }
}

Here are the available tools:
"#;

#[derive(Debug, Deserialize)]
struct ToolCallEnvelope {
    tool_call: ToolCallRequest,
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    name: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

/// 会话参与者：名称、生成能力、系统指令、放弃指令与可用工具。
pub struct Agent {
    name: String,
    provider: Arc<dyn Provider>,
    system_message: String,
    ignore_trigger_prompt: String,
    tools: Vec<Arc<ToolHandle>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        Self {
            name: name.into(),
            provider,
            system_message: String::new(),
            ignore_trigger_prompt: String::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    pub fn with_ignore_trigger_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.ignore_trigger_prompt = prompt.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<ToolHandle>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<ToolHandle>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn ignore_trigger_prompt(&self) -> &str {
        &self.ignore_trigger_prompt
    }

    pub fn tools(&self) -> &[Arc<ToolHandle>] {
        &self.tools
    }

    /// 系统指令加上工具说明（仅在配置了工具时）。
    pub fn effective_system_prompt(&self) -> String {
        if self.tools.is_empty() {
            return self.system_message.clone();
        }

        let schemas: Vec<ToolSchema> = self.tools.iter().map(|tool| tool.schema()).collect();
        let rendered = serde_json::to_string_pretty(&schemas).unwrap_or_default();
        format!("{}{TOOLS_PREAMBLE}{rendered}", self.system_message)
    }

    /// 基于总线当前历史生成回复。
    ///
    /// 若首次回复是一个指向已注册工具的 `tool_call` JSON 对象，则执行该工具，
    /// 向总线追加调用意图与工具输出两条消息，再基于扩充后的历史生成一次并返回。
    /// 工具输出不会再被解析为新的工具调用。生成与工具错误原样向上传播。
    #[tracing::instrument(skip(self, bus), fields(agent = %self.name))]
    pub async fn generate_response(&self, bus: &mut Bus) -> Result<AgentResponse> {
        let system_prompt = self.effective_system_prompt();
        let response = self.generate(bus.history(), &system_prompt).await?;

        let Some(request) = parse_tool_call(&response.content) else {
            return Ok(response);
        };
        let Some(tool) = self.find_tool(&request.name) else {
            debug!(tool = %request.name, "tool call names an unknown tool, keeping reply");
            return Ok(response);
        };

        info!(tool = %request.name, "agent requested tool call");
        let output = tool.execute(&request.parameters).await?;

        bus.add_message(
            Message::agent(&self.name, response.content.clone())
                .addressed_to(&request.name, SenderType::Tool),
        );
        bus.add_message(Message::tool(&request.name, serde_json::to_string(&output)?));

        self.generate(bus.history(), &system_prompt).await
    }

    async fn generate(&self, history: &[Message], system_prompt: &str) -> Result<AgentResponse> {
        debug!(
            provider = %self.provider.name(),
            history_len = history.len(),
            "requesting generation"
        );
        let timed = self
            .provider
            .generate_timed(history, system_prompt, &self.ignore_trigger_prompt)
            .await?;
        debug!(latency_ms = timed.latency().as_millis() as u64, "generation finished");
        Ok(timed.into_response())
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<ToolHandle>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

fn parse_tool_call(content: &str) -> Option<ToolCallRequest> {
    serde_json::from_str::<ToolCallEnvelope>(content)
        .ok()
        .map(|envelope| envelope.tool_call)
}
