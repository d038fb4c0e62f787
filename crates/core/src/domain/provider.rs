use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use super::{AgentResponse, Message, TimedAgentResponse};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider timeout")]
    Timeout,
    #[error("provider failed: {0}")]
    Failed(String),
    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// A generation backend. Concrete model clients live outside the engine.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        history: &[Message],
        system_message: &str,
    ) -> Result<AgentResponse, ProviderError>;

    async fn generate_timed(
        &self,
        history: &[Message],
        system_message: &str,
        ignore_trigger_prompt: &str,
    ) -> Result<TimedAgentResponse, ProviderError> {
        let system_message = compose_system_message(system_message, ignore_trigger_prompt);
        let started = Instant::now();
        let response = self.generate(history, &system_message).await?;
        Ok(TimedAgentResponse::new(response, started.elapsed()))
    }
}

/// Appends the ignore instruction to the system prompt, separated by a blank
/// line.
pub fn compose_system_message(system_message: &str, ignore_trigger_prompt: &str) -> String {
    if ignore_trigger_prompt.is_empty() {
        system_message.to_string()
    } else {
        format!("{system_message}\n\n{ignore_trigger_prompt}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingProvider {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(
            &self,
            _history: &[Message],
            system_message: &str,
        ) -> Result<AgentResponse, ProviderError> {
            self.prompts
                .lock()
                .expect("prompt log should not be poisoned")
                .push(system_message.to_string());
            Ok(AgentResponse::new("done"))
        }
    }

    #[test]
    fn ignore_prompt_is_appended_after_blank_line() {
        assert_eq!(compose_system_message("base", ""), "base");
        assert_eq!(
            compose_system_message("base", "say IGNORE_MESSAGE"),
            "base\n\nsay IGNORE_MESSAGE"
        );
    }

    #[tokio::test]
    async fn generate_timed_passes_composed_prompt() {
        let provider = RecordingProvider {
            prompts: Mutex::new(Vec::new()),
        };

        let timed = provider
            .generate_timed(&[Message::user("hi")], "system", "abstain")
            .await
            .expect("generation should succeed");

        assert_eq!(timed.content, "done");
        assert_eq!(
            provider.prompts.lock().expect("not poisoned").as_slice(),
            ["system\n\nabstain".to_string()]
        );
    }
}
