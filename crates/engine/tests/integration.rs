mod common;

use std::sync::Arc;

use colloquy_core::{IGNORE_SENTINEL, Message, SenderType, Verdict};
use colloquy_engine::{
    Agent, ConversationEvent, EngineConfig, EngineError, Harness, Judge, Orchestrator,
    RoutingPolicy, Session, SessionOptions, ToolHandle,
};
use common::{CountingProvider, DoublingTool};

fn agent(name: &str, provider: &Arc<CountingProvider>) -> Arc<Agent> {
    Arc::new(Agent::new(name, provider.clone()))
}

fn session(policy: RoutingPolicy, agents: Vec<Arc<Agent>>) -> Session {
    Session::new(SessionOptions {
        agents,
        policy,
        ..SessionOptions::default()
    })
    .expect("session should build")
}

#[tokio::test]
async fn test_history_length_matches_appended_messages() {
    let alice = CountingProvider::shared(&["one", "two", "three"]);
    let mut session = session(RoutingPolicy::FirstResponder, vec![agent("Alice", &alice)]);

    for turn in 1..=3 {
        session.user_says(format!("question {turn}"));
        session
            .agent_responds("Alice")
            .await
            .expect("Alice should reply");
    }

    assert_eq!(session.message_history().len(), 6);
    assert_eq!(alice.history_lens(), [1, 3, 5]);
    let contents: Vec<&str> = session
        .message_history()
        .iter()
        .map(Message::content)
        .collect();
    assert_eq!(
        contents,
        ["question 1", "one", "question 2", "two", "question 3", "three"]
    );
}

#[tokio::test]
async fn test_empty_transcript_skips_judge_call() {
    let provider = CountingProvider::shared(&[r#"{"verdict":"SUCCESS","score":10}"#]);
    let judge = Judge::new(provider.clone());
    let session = session(RoutingPolicy::FirstResponder, Vec::new());

    let result = judge
        .judge_session(&session)
        .await
        .expect("judging never fails on empty transcripts");

    assert_eq!(result.verdict, Verdict::Failure);
    assert_eq!(result.score.value(), 0.0);
    assert!(result.reasoning.contains("empty"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_non_json_judge_output_becomes_failure() {
    let provider = CountingProvider::shared(&["not valid json at all"]);
    let judge = Judge::new(provider.clone());
    let mut session = session(RoutingPolicy::FirstResponder, Vec::new());
    session.user_says("What is the capital of France?");

    let result = judge
        .judge_session(&session)
        .await
        .expect("parse failures are not errors");

    assert_eq!(result.verdict, Verdict::Failure);
    assert_eq!(result.score.value(), 0.0);
    assert!(result.reasoning.contains("Error parsing judge's JSON response"));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_fenced_judge_output_is_parsed() {
    let provider = CountingProvider::shared(&[
        "```json\n{\"verdict\":\"SUCCESS\",\"score\":9,\"reasoning\":\"ok\"}\n```",
    ]);
    let judge = Judge::new(provider);
    let mut session = session(RoutingPolicy::FirstResponder, Vec::new());
    session.user_says("What is the capital of France?");
    session.agent_says("Alice", "user", "Paris.");

    let result = judge.judge_session(&session).await.expect("judge should run");

    assert_eq!(result.verdict, Verdict::Success);
    assert_eq!(result.score.value(), 9.0);
    assert_eq!(result.reasoning, "ok");
}

#[tokio::test]
async fn test_ignore_sentinel_skips_abstaining_agent() {
    let a = CountingProvider::shared(&[IGNORE_SENTINEL]);
    let b = CountingProvider::shared(&["hello"]);
    let mut session = session(
        RoutingPolicy::IgnoreSentinel,
        vec![agent("A", &a), agent("B", &b)],
    );
    let mut events = session.subscribe_events();

    let responder = session
        .user_says_and_broadcast("hi")
        .await
        .expect("broadcast should succeed")
        .expect("B should answer");

    assert_eq!(responder.agent_name, "B");
    assert_eq!(responder.response.content, "hello");
    assert!(session.message_history().iter().all(|m| m.sender() != "A"));
    assert_eq!(session.message_history().len(), 2);
    assert_eq!((a.calls(), b.calls()), (1, 1));

    let abstained = events.drain().into_iter().any(|event| {
        matches!(event, ConversationEvent::AgentAbstained { agent_name, .. } if agent_name == "A")
    });
    assert!(abstained);
}

#[tokio::test]
async fn test_ignore_sentinel_with_every_agent_abstaining() {
    let a = CountingProvider::shared(&[IGNORE_SENTINEL]);
    let b = CountingProvider::shared(&["  IGNORE_MESSAGE\n"]);
    let mut session = session(
        RoutingPolicy::IgnoreSentinel,
        vec![agent("A", &a), agent("B", &b)],
    );

    let responder = session
        .user_says_and_broadcast("hi")
        .await
        .expect("broadcast should succeed");

    assert!(responder.is_none());
    assert_eq!(session.message_history().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_unknown_choice_routes_nowhere() {
    let a = CountingProvider::shared(&["from A"]);
    let router = CountingProvider::shared(&["Charlie"]);
    let mut session = Session::new(SessionOptions {
        agents: vec![agent("A", &a)],
        orchestrator: Some(Orchestrator::new(router.clone())),
        policy: RoutingPolicy::OrchestratorAgent,
        ..SessionOptions::default()
    })
    .expect("session should build");

    let responder = session
        .user_says_and_broadcast("hi")
        .await
        .expect("unmatched choice is not an error");

    assert!(responder.is_none());
    assert_eq!(session.message_history().len(), 1);
    assert_eq!(router.calls(), 1);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_orchestrator_delegates_to_named_agent() {
    let a = CountingProvider::shared(&["from A"]);
    let b = CountingProvider::shared(&["from B"]);
    let router = CountingProvider::shared(&["  B \n"]);
    let mut session = Session::new(SessionOptions {
        agents: vec![agent("A", &a), agent("B", &b)],
        orchestrator: Some(Orchestrator::new(router)),
        policy: RoutingPolicy::OrchestratorAgent,
        ..SessionOptions::default()
    })
    .expect("session should build");

    let responder = session
        .user_says_and_broadcast("hi")
        .await
        .expect("broadcast should succeed")
        .expect("B should be chosen");

    assert_eq!(responder.agent_name, "B");
    assert_eq!(a.calls(), 0);
    let last = session.message_history().last().expect("reply appended");
    assert_eq!(last.sender(), "B");
    assert_eq!(last.content(), "from B");
}

#[tokio::test]
async fn test_tool_call_loop_appends_two_messages() {
    let provider = CountingProvider::shared(&[
        r#"{"tool_call":{"name":"calc","parameters":{"x":2}}}"#,
        "The answer is 4",
    ]);
    let calc = Arc::new(ToolHandle::new(DoublingTool));
    let alice = Arc::new(Agent::new("Alice", provider.clone()).with_tool(calc.clone()));
    let mut session = session(RoutingPolicy::FirstResponder, vec![alice]);
    session.user_says("What is 2 doubled?");

    let response = session
        .agent_responds("Alice")
        .await
        .expect("tool loop should succeed")
        .expect("Alice should answer");

    assert_eq!(response.content, "The answer is 4");
    assert_eq!(provider.calls(), 2);
    assert_eq!(provider.history_lens(), [1, 3]);
    assert_eq!(calc.call_count().await, 1);

    let history = session.message_history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[1].sender(), "Alice");
    assert_eq!(history[1].receiver(), Some("calc"));
    assert_eq!(history[1].receiver_type(), Some(SenderType::Tool));
    assert_eq!(history[2].sender(), "calc");
    assert_eq!(history[2].sender_type(), SenderType::Tool);
    assert_eq!(history[2].content(), "4");
    assert_eq!(history[3].content(), "The answer is 4");
}

#[tokio::test]
async fn test_tool_error_propagates() {
    let provider = CountingProvider::shared(&[r#"{"tool_call":{"name":"calc","parameters":{}}}"#]);
    let calc = Arc::new(ToolHandle::new(DoublingTool));
    let alice = Arc::new(Agent::new("Alice", provider).with_tool(calc.clone()));
    let mut session = session(RoutingPolicy::FirstResponder, vec![alice]);
    session.user_says("double nothing");

    let err = session
        .agent_responds("Alice")
        .await
        .expect_err("missing parameter should fail");

    assert!(matches!(err, EngineError::Tool(_)));
    assert_eq!(calc.call_count().await, 0);
}

#[test]
fn test_duplicate_registration_keeps_first() {
    let first = CountingProvider::shared(&["first"]);
    let second = CountingProvider::shared(&["second"]);
    let mut session = session(RoutingPolicy::FirstResponder, vec![agent("Alice", &first)]);

    let err = session
        .add_participant(agent("Alice", &second))
        .expect_err("duplicate name should fail");
    assert!(matches!(err, EngineError::AgentConflict(ref name) if name == "Alice"));

    let registered = session.bus().get_agent("Alice").expect("first agent remains");
    tokio_test::block_on(async {
        session.user_says("hi");
        session.agent_responds("Alice").await.expect("Alice should reply");
    });
    assert_eq!(registered.name(), "Alice");
    assert_eq!((first.calls(), second.calls()), (1, 0));
}

#[tokio::test]
async fn test_judge_and_assert_lists_failed_requirements() {
    let provider = CountingProvider::shared(&[r#"
        {
          "overall_assessment": {"verdict": "SUCCESS", "score": 8, "reasoning": "answered"},
          "requirements": [
            {"requirement": "mentions Paris", "verdict": "FAILURE", "score": 1, "reasoning": "no Paris"},
            {"requirement": "is polite", "verdict": "SUCCESS", "score": 9, "reasoning": "polite"}
          ]
        }"#]);
    let judge = Judge::with_requirements(provider, ["mentions Paris", "is polite"]);
    let mut session = session(RoutingPolicy::FirstResponder, Vec::new());
    session.user_says("Where is the Louvre?");
    session.agent_says("Alice", "user", "In France, please enjoy.");

    let err = judge
        .judge_and_assert(&mut session)
        .await
        .expect_err("failed requirement should reject");

    match err {
        EngineError::JudgeRejected(message) => {
            assert!(message.contains("Requirement 'mentions Paris' was not met. Reason: no Paris"));
            assert!(!message.contains("is polite"));
            assert!(!message.contains("marked session as FAILURE"));
        }
        other => panic!("expected JudgeRejected, got: {other:?}"),
    }

    let stored = session.judge_result().expect("result should be stored");
    assert_eq!(stored.verdict, Verdict::Success);
    assert_eq!(stored.requirements.len(), 2);
}

#[tokio::test]
async fn test_harness_runs_configured_scenario() {
    let config = EngineConfig::from_str(
        r#"
[session]
policy = "ignore_sentinel"

[providers.quiet]
type = "scripted"
responses = ["IGNORE_MESSAGE"]

[providers.echo]
type = "echo"
prefix = "you said: "

[providers.judge]
type = "scripted"
responses = ['{"verdict": "SUCCESS", "score": 7.5, "reasoning": "echoed"}']

[[agents]]
name = "Quiet"
provider = "quiet"

[[agents]]
name = "Echo"
provider = "echo"

[judge]
provider = "judge"
"#,
    )
    .expect("config should parse");

    let mut harness = Harness::from_config(config).expect("harness should build");
    let mut events = harness.subscribe_events();
    let session = harness.session_from_config().expect("session should build");
    let id = session.id();

    let responder = session
        .user_says_and_broadcast("ping")
        .await
        .expect("broadcast should succeed")
        .expect("Echo should answer");
    assert_eq!(responder.response.content, "you said: ping");

    harness.conclude().await.expect("scenario should pass");

    let session = harness.session(id).expect("session exists");
    assert_eq!(
        session.judge_result().map(|r| r.score.value()),
        Some(7.5)
    );

    let selected = events.drain().into_iter().any(|event| {
        matches!(
            event,
            ConversationEvent::ResponderSelected { agent_name: Some(ref name), .. } if name == "Echo"
        )
    });
    assert!(selected);
}

#[tokio::test]
async fn test_harness_conclude_collects_every_failure() {
    let mut harness = Harness::new();
    harness.register_provider("mock", CountingProvider::shared(&["hi", "hi again"]));
    let provider = harness.provider("mock").expect("provider registered");
    harness
        .create_agent("Alice", provider, "", "", &[])
        .expect("agent should build");

    let session = harness
        .create_session(SessionOptions {
            validators: vec![
                colloquy_engine::validators::turn_taking(),
                colloquy_engine::validators::agent_not_participating("Alice"),
            ],
            ..SessionOptions::default()
        })
        .expect("session should build");
    session.user_says("hello");
    session.agent_responds("Alice").await.expect("first reply");
    session.agent_responds("Alice").await.expect("second reply");

    let err = harness.conclude().await.expect_err("both validators fail");

    match err {
        EngineError::ValidationFailed(failures) => assert_eq!(failures.len(), 2),
        other => panic!("expected ValidationFailed, got: {other:?}"),
    }
}
