pub mod agent;
pub mod assertions;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod harness;
pub mod judge;
pub mod orchestrator;
pub mod providers;
pub mod routing;
pub mod session;
pub mod tool;
pub mod validators;

pub use agent::Agent;
pub use assertions::{CheckResult, MessageAssertion, SessionAssertion};
pub use bus::Bus;
pub use config::{
    AgentConfig, EngineConfig, JudgeConfig, OrchestratorConfig, ProviderConfig, SessionConfig,
    ToolConfig,
};
pub use error::{EngineError, ErrorKind, Result};
pub use events::{ConversationEvent, EventBroadcaster, EventStream};
pub use harness::Harness;
pub use judge::{Judge, TranscriptSource};
pub use orchestrator::Orchestrator;
pub use providers::{CallStrategy, CallableProvider, EchoProvider, ExistingAgent, ScriptedProvider};
pub use routing::{Responder, RoutingPolicy, SentinelMatch};
pub use session::{Session, SessionOptions};
pub use tool::{StaticTool, ToolHandle};
pub use validators::{ValidationOutcome, Validator};
