use async_trait::async_trait;
use colloquy_core::{AgentResponse, Message, Provider, ProviderError};

use super::last_content;

/// 原样回显最后一条消息，可附带前缀。
#[derive(Debug, Clone)]
pub struct EchoProvider {
    name: String,
    prefix: String,
}

impl EchoProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            name: "echo".to_string(),
            prefix: prefix.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        history: &[Message],
        _system_message: &str,
    ) -> Result<AgentResponse, ProviderError> {
        Ok(AgentResponse::new(format!(
            "{}{}",
            self.prefix,
            last_content(history)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_message_with_prefix() {
        let provider = EchoProvider::new("echo: ");

        let response = provider
            .generate(&[Message::user("ping")], "ignored")
            .await
            .expect("echo never fails");

        assert_eq!(response.content, "echo: ping");
    }

    #[tokio::test]
    async fn empty_history_echoes_prefix_only() {
        let response = EchoProvider::default()
            .generate(&[], "")
            .await
            .expect("echo never fails");

        assert_eq!(response.content, "");
    }
}
