//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use flagsolve_core::providers::{CompletionRequest, CompletionResponse, LlmProvider};
use flagsolve_core::sandbox::{ExecOutput, SandboxDriver};
use flagsolve_core::state::MetricsTracker;
use flagsolve_core::{Error, Result};
use tokio::time::Duration;

/// Provider returning scripted responses in order
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<CompletionResponse>>,
    metrics: MetricsTracker,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            metrics: MetricsTracker::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completion calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .ok_or_else(|| Error::Provider("script exhausted".to_string()))
    }

    fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }
}

/// Sandbox driver with scripted outputs and lifecycle counters
#[derive(Default)]
pub struct FakeDriver {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub fail_create: bool,
    /// Scripted outputs, popped per run; an echo output when empty
    pub outputs: Mutex<VecDeque<ExecOutput>>,
    /// Delay applied to every run, to exercise timeouts
    pub delay: Option<Duration>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn with_outputs(outputs: Vec<ExecOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            ..Default::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxDriver for FakeDriver {
    async fn create(&self) -> Result<String> {
        if self.fail_create {
            return Err(Error::SandboxUnavailable(
                "docker daemon unreachable".to_string(),
            ));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("sandbox-{}", n))
    }

    async fn run(&self, _handle: &str, command: &str, _timeout: Duration) -> Result<ExecOutput> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.outputs.lock().expect("lock").pop_front();
        Ok(scripted.unwrap_or_else(|| ExecOutput {
            exit_code: 0,
            stdout: format!("ran: {}", command),
            ..Default::default()
        }))
    }

    async fn destroy(&self, _handle: &str) -> Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
