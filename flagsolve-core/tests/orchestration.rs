//! End-to-end orchestration loop tests against scripted fakes

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod common;

use std::sync::Arc;

use flagsolve_core::agents::{Orchestrator, Prompts, TurnOutcome};
use flagsolve_core::config::SolverConfig;
use flagsolve_core::conversation::{
    DelegationOutcome, Message, ToolInvocationRequest, ToolStatus, COORDINATOR,
};
use flagsolve_core::events::{DisplayEvent, VecSink};
use flagsolve_core::providers::CompletionResponse;
use flagsolve_core::sandbox::{ExecOutput, SandboxStatus};
use flagsolve_core::state::MemoryStore;
use serde_json::json;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{FakeDriver, ScriptedProvider};

struct Harness {
    orchestrator: Orchestrator,
    provider: Arc<ScriptedProvider>,
    driver: Arc<FakeDriver>,
    sink: Arc<VecSink>,
}

fn harness_with(
    config: SolverConfig,
    driver: FakeDriver,
    responses: Vec<CompletionResponse>,
) -> Harness {
    let prompts = Prompts::default();
    let provider = Arc::new(ScriptedProvider::new(responses));
    let driver = Arc::new(driver);
    let sink = Arc::new(VecSink::new());
    let orchestrator = Orchestrator::new(
        "test-session",
        &config,
        &prompts,
        provider.clone(),
        driver.clone(),
        Arc::new(MemoryStore::new()),
        sink.clone(),
    )
    .expect("should build orchestrator");

    Harness {
        orchestrator,
        provider,
        driver,
        sink,
    }
}

fn harness(responses: Vec<CompletionResponse>) -> Harness {
    harness_with(SolverConfig::default(), FakeDriver::new(), responses)
}

fn shell_call(command: &str) -> ToolInvocationRequest {
    ToolInvocationRequest::new("shell", json!({"command": command}))
}

fn delegate_call(agent: &str, task: &str) -> ToolInvocationRequest {
    ToolInvocationRequest::new("delegate", json!({"agent": agent, "task": task}))
}

#[tokio::test]
async fn test_plain_answer_allocates_no_sandbox() {
    let mut h = harness(vec![CompletionResponse::text_only(
        "That target is out of scope.",
    )]);
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve example.com", &cancel)
        .await
        .expect("turn should succeed");

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            reply: "That target is out of scope.".to_string()
        }
    );
    // Lazy creation: no tool call means no remote resource
    assert_eq!(h.driver.created(), 0);
    assert_eq!(h.orchestrator.sandbox_status().await, SandboxStatus::NotCreated);
    assert_eq!(h.orchestrator.history().len(), 2);

    let events = h.sink.events();
    assert!(matches!(events[0], DisplayEvent::Narrative { .. }));
}

#[tokio::test]
async fn test_shell_iterations_share_one_sandbox() {
    let mut h = harness(vec![
        CompletionResponse::with_calls(
            Some("Scanning ports first.".to_string()),
            vec![shell_call("nmap -p- 10.0.0.5")],
        ),
        CompletionResponse::with_calls(None, vec![shell_call("curl http://10.0.0.5")]),
        CompletionResponse::text_only("Port 80 serves the challenge app."),
    ]);
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve 10.0.0.5", &cancel)
        .await
        .expect("turn should succeed");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    // Two commands, one environment
    assert_eq!(h.driver.created(), 1);
    assert_eq!(h.orchestrator.sandbox_status().await, SandboxStatus::Live);

    // History: user, agent+call, tool, agent+call, tool, agent text
    let history = h.orchestrator.history();
    assert_eq!(history.len(), 6);
    match &history[2] {
        Message::Tool(result) => {
            assert!(result.success);
            assert!(result.output.contains("nmap -p- 10.0.0.5"));
        }
        other => panic!("expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_budget_limit_one_reports_partial_with_tool_output() {
    let mut config = SolverConfig::default();
    config.budgets.coordinator_steps = 1;

    let mut h = harness_with(
        config,
        FakeDriver::with_outputs(vec![ExecOutput {
            exit_code: 0,
            stdout: "22/tcp open ssh".to_string(),
            ..Default::default()
        }]),
        vec![
            CompletionResponse::with_calls(None, vec![shell_call("nmap 10.0.0.5")]),
            // Never reached: the budget denies the second iteration
            CompletionResponse::text_only("unreachable"),
        ],
    );
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve 10.0.0.5", &cancel)
        .await
        .expect("turn should succeed");

    // Exactly one tool invocation occurred, then exhaustion with its output
    match outcome {
        TurnOutcome::BudgetExhausted { partial } => {
            assert!(partial.contains("22/tcp open ssh"));
        }
        other => panic!("expected budget exhaustion, got {:?}", other),
    }
    assert_eq!(h.provider.calls(), 1);

    let events = h.sink.events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, DisplayEvent::Warning(text) if text.contains("Step limit"))),
        "operator should see a budget warning"
    );
}

#[tokio::test]
async fn test_unknown_delegation_typo_recovers() {
    let mut h = harness(vec![
        CompletionResponse::with_calls(
            None,
            vec![delegate_call("recon-specialit", "scan the target")],
        ),
        CompletionResponse::text_only("Retrying with the correct specialist name."),
    ]);
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve 10.0.0.5", &cancel)
        .await
        .expect("turn should not crash");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    // The failed delegation is in history as a corrective signal
    let delegation = h
        .orchestrator
        .history()
        .iter()
        .find_map(|m| match m {
            Message::Delegation(result) => Some(result.clone()),
            _ => None,
        })
        .expect("delegation result should be in history");
    assert_eq!(delegation.outcome, DelegationOutcome::NotFound);
    assert!(delegation.summary.contains("recon-specialist"));

    // The failed iteration still consumed a coordinator step
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.orchestrator.steps_total(), 2);
}

#[tokio::test]
async fn test_command_timeout_surfaces_as_data() {
    let mut config = SolverConfig::default();
    config.sandbox.command_timeout_secs = 1;

    let driver = FakeDriver {
        delay: Some(Duration::from_secs(10)),
        ..Default::default()
    };

    let mut h = harness_with(
        config,
        driver,
        vec![
            CompletionResponse::with_calls(None, vec![shell_call("nc 10.0.0.5 1234")]),
            CompletionResponse::text_only("The service hangs; trying another port."),
        ],
    );
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve 10.0.0.5", &cancel)
        .await
        .expect("timeout must not be an unhandled fault");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let timeout_result = h
        .orchestrator
        .history()
        .iter()
        .find_map(|m| match m {
            Message::Tool(result) => Some(result.clone()),
            _ => None,
        })
        .expect("tool result should be in history");
    assert!(!timeout_result.success);
    assert_eq!(timeout_result.status, ToolStatus::Timeout);
}

#[tokio::test]
async fn test_delegation_isolation_summary_only() {
    let mut h = harness(vec![
        // Coordinator delegates
        CompletionResponse::with_calls(
            Some("Recon first.".to_string()),
            vec![delegate_call("recon-specialist", "scan 10.0.0.5")],
        ),
        // Sub-agent: one shell call, then a final report
        CompletionResponse::with_calls(None, vec![shell_call("nmap -sV 10.0.0.5")]),
        CompletionResponse::text_only("Open: 22/ssh, 80/http (Apache 2.4.49)."),
        // Coordinator concludes
        CompletionResponse::text_only("Apache 2.4.49 is vulnerable to path traversal."),
    ]);
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve 10.0.0.5", &cancel)
        .await
        .expect("turn should succeed");
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    // Coordinator history contains exactly one delegation summary and none
    // of the sub-agent's internal trace
    let history = h.orchestrator.history();
    let delegations = history
        .iter()
        .filter(|m| matches!(m, Message::Delegation(_)))
        .count();
    assert_eq!(delegations, 1);

    let sub_agent_messages = history
        .iter()
        .filter(|m| matches!(m, Message::Agent { source, .. } if source != COORDINATOR))
        .count();
    assert_eq!(sub_agent_messages, 0, "sub-agent trace must not leak");

    let tool_results = history
        .iter()
        .filter(|m| matches!(m, Message::Tool(_)))
        .count();
    assert_eq!(tool_results, 0, "sub-agent tool traffic must not leak");

    match history.iter().find(|m| matches!(m, Message::Delegation(_))) {
        Some(Message::Delegation(result)) => {
            assert_eq!(result.agent, "recon-specialist");
            assert_eq!(result.outcome, DelegationOutcome::Completed);
            assert!(result.summary.contains("Apache 2.4.49"));
        }
        _ => unreachable!(),
    }

    // The operator still saw the sub-agent working
    let events = h.sink.events();
    let sub_agent_events = events
        .iter()
        .filter(|e| match e {
            DisplayEvent::ToolInvoked { agent, .. } => agent == "recon-specialist",
            _ => false,
        })
        .count();
    assert!(sub_agent_events > 0, "sub-agent traffic must reach the sink");
}

#[tokio::test]
async fn test_subagent_steps_do_not_consume_coordinator_budget() {
    let mut config = SolverConfig::default();
    config.budgets.coordinator_steps = 2;

    // The sub-agent burns 3 of its own steps; the coordinator only needs 2
    let mut h = harness_with(
        config,
        FakeDriver::new(),
        vec![
            CompletionResponse::with_calls(
                None,
                vec![delegate_call("recon-specialist", "deep scan")],
            ),
            CompletionResponse::with_calls(None, vec![shell_call("nmap -p- t")]),
            CompletionResponse::with_calls(None, vec![shell_call("gobuster dir -u t")]),
            CompletionResponse::text_only("Found /admin and /backup."),
            CompletionResponse::text_only("Check /backup for credentials."),
        ],
    );
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve t", &cancel)
        .await
        .expect("turn should succeed");

    // The coordinator completed within its 2-step budget
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    assert_eq!(h.provider.calls(), 5);
}

#[tokio::test]
async fn test_sandbox_create_failure_is_infrastructure_data() {
    let mut h = harness_with(
        SolverConfig::default(),
        FakeDriver::failing_create(),
        vec![
            CompletionResponse::with_calls(None, vec![shell_call("id")]),
            CompletionResponse::text_only("The sandbox is down; report to the operator."),
        ],
    );
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve t", &cancel)
        .await
        .expect("infrastructure failure must not crash the turn");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let result = h
        .orchestrator
        .history()
        .iter()
        .find_map(|m| match m {
            Message::Tool(result) => Some(result.clone()),
            _ => None,
        })
        .expect("tool result should be in history");
    assert_eq!(result.status, ToolStatus::Infrastructure);
    assert!(result.output.contains("docker daemon unreachable"));
}

#[tokio::test]
async fn test_cancelled_turn_preserves_history() {
    let mut h = harness(vec![CompletionResponse::text_only("never reached")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .orchestrator
        .run_turn("solve t", &cancel)
        .await
        .expect("cancellation is not an error");

    assert_eq!(outcome, TurnOutcome::Cancelled);
    // Only the completed step (the user input) is in history
    assert_eq!(h.orchestrator.history().len(), 1);
    assert!(matches!(
        h.orchestrator.history()[0],
        Message::User { .. }
    ));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let mut h = harness(vec![
        CompletionResponse::with_calls(None, vec![shell_call("id")]),
        CompletionResponse::text_only("done"),
    ]);
    let cancel = CancellationToken::new();

    h.orchestrator
        .run_turn("solve t", &cancel)
        .await
        .expect("turn should succeed");
    assert_eq!(h.driver.created(), 1);

    h.orchestrator.shutdown().await;
    h.orchestrator.shutdown().await;
    h.orchestrator.shutdown().await;

    assert_eq!(h.driver.destroyed(), 1);
    assert_eq!(
        h.orchestrator.sandbox_status().await,
        SandboxStatus::Released
    );
}

#[tokio::test]
async fn test_shutdown_without_sandbox_is_noop() {
    let h = harness(vec![]);
    h.orchestrator.shutdown().await;
    assert_eq!(h.driver.destroyed(), 0);
}

#[tokio::test]
async fn test_coordinator_rejects_unknown_tool() {
    let mut h = harness(vec![
        CompletionResponse::with_calls(
            None,
            vec![ToolInvocationRequest::new(
                "browser",
                json!({"url": "http://t"}),
            )],
        ),
        CompletionResponse::text_only("Falling back to curl."),
    ]);
    let cancel = CancellationToken::new();

    let outcome = h
        .orchestrator
        .run_turn("solve t", &cancel)
        .await
        .expect("unknown tool must not crash the turn");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    let rejected = h
        .orchestrator
        .history()
        .iter()
        .find_map(|m| match m {
            Message::Tool(result) => Some(result.clone()),
            _ => None,
        })
        .expect("rejection should be in history");
    assert_eq!(rejected.status, ToolStatus::Rejected);
    assert!(rejected.output.contains("browser"));
}
