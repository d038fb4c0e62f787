use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use colloquy_api_types::{TestReport, TestStatus};
use colloquy_engine::{EngineConfig, Harness, Session};
use serde::Deserialize;
use tracing::{error, info, warn};

/// 场景文件：引擎配置加上按顺序执行的步骤。
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    UserSays {
        text: String,
    },
    Broadcast {
        text: String,
    },
    AgentResponds {
        agent: String,
    },
    AgentSays {
        from: String,
        to: String,
        text: String,
    },
    AgentConversation {
        initiator: String,
        responder: String,
        text: String,
        #[serde(default = "default_max_turns")]
        max_turns: usize,
    },
}

impl Scenario {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("failed to parse scenario file: {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("failed to deserialize scenario")
    }

    /// 执行全部步骤并结束会话。步骤或校验失败只影响报告状态，不作为错误返回。
    pub async fn run(self) -> anyhow::Result<TestReport> {
        let start = Utc::now();
        let mut harness =
            Harness::from_config(self.engine).context("failed to initialize harness")?;

        let mut events = harness.subscribe_events();
        let event_logger = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(?event, "conversation event");
            }
        });

        let session = harness
            .session_from_config()
            .context("failed to create session")?;
        info!(scenario = %self.name, steps = self.steps.len(), "running scenario");

        let mut status = TestStatus::Passed;
        for (index, step) in self.steps.into_iter().enumerate() {
            if let Err(err) = execute(session, step).await {
                error!(step = index + 1, error = %err, "scenario step failed");
                status = TestStatus::Failed;
                break;
            }
        }

        if status == TestStatus::Passed {
            if let Err(err) = harness.conclude().await {
                warn!(error = %err, "session conclusion failed");
                status = TestStatus::Failed;
            }
        }

        let report = harness.report(&self.name, status, start, Utc::now());
        event_logger.abort();
        Ok(report)
    }
}

async fn execute(session: &mut Session, step: Step) -> colloquy_engine::Result<()> {
    match step {
        Step::UserSays { text } => {
            session.user_says(text);
        }
        Step::Broadcast { text } => {
            let responder = session.user_says_and_broadcast(text).await?;
            info!(
                responder = responder.as_ref().map(|r| r.agent_name.as_str()).unwrap_or("<none>"),
                "broadcast answered"
            );
        }
        Step::AgentResponds { agent } => {
            if session.agent_responds(&agent).await?.is_none() {
                info!(agent = %agent, "agent abstained");
            }
        }
        Step::AgentSays { from, to, text } => {
            session.agent_says(from, to, text);
        }
        Step::AgentConversation {
            initiator,
            responder,
            text,
            max_turns,
        } => {
            let log = session
                .run_agent_conversation(&initiator, &responder, text, max_turns)
                .await?;
            info!(messages = log.len(), "agent conversation finished");
        }
    }
    Ok(())
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_max_turns() -> usize {
    3
}
