//! Sandbox session manager: one live environment per session

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::Result;

use super::{ExecOutput, SandboxDriver};

/// A live remote execution environment
#[derive(Debug, Clone)]
struct SandboxHandle {
    id: String,
    created_at: DateTime<Utc>,
    alive: bool,
}

/// Liveness snapshot of a session's sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxStatus {
    /// No environment allocated yet
    NotCreated,
    Live,
    Released,
}

/// Owns the sandbox lifecycle for one session.
///
/// Creation is lazy: no remote resource is allocated until the first command.
/// All access serializes on an internal lock, so concurrent tool dispatches
/// against the same session queue rather than racing the shared environment.
pub struct SandboxManager {
    driver: Arc<dyn SandboxDriver>,
    handle: Mutex<Option<SandboxHandle>>,
    command_timeout: Duration,
}

impl SandboxManager {
    pub fn new(driver: Arc<dyn SandboxDriver>, command_timeout: Duration) -> Self {
        Self {
            driver,
            handle: Mutex::new(None),
            command_timeout,
        }
    }

    /// Return the session's live handle id, creating the environment on
    /// first use. Repeated calls reuse the same environment.
    pub async fn acquire(&self) -> Result<String> {
        let mut guard = self.handle.lock().await;
        Ok(self.ensure(&mut guard).await?.id)
    }

    /// Run a command in the session's sandbox, creating it on first use.
    ///
    /// The execution is bounded by the configured timeout even if the driver
    /// never returns; a timed-out command yields an [`ExecOutput`] with
    /// `timed_out` set rather than blocking the caller.
    pub async fn run_command(&self, command: &str) -> Result<ExecOutput> {
        // Hold the lock for the whole execution: commands against one
        // session queue rather than race the shared environment.
        let mut guard = self.handle.lock().await;
        let handle = self.ensure(&mut guard).await?;

        match tokio::time::timeout(
            self.command_timeout,
            self.driver.run(&handle.id, command, self.command_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Ok(ExecOutput::from_timeout(String::new(), self.command_timeout)),
        }
    }

    async fn ensure(&self, slot: &mut Option<SandboxHandle>) -> Result<SandboxHandle> {
        if let Some(handle) = slot.as_ref().filter(|h| h.alive) {
            return Ok(handle.clone());
        }
        debug!("No live sandbox for session, creating one");
        let id = self.driver.create().await?;
        let handle = SandboxHandle {
            id,
            created_at: Utc::now(),
            alive: true,
        };
        info!(
            "Sandbox created: {} at {}",
            handle.id,
            handle.created_at.to_rfc3339()
        );
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Tear down the session's sandbox. Idempotent: releasing an already
    /// released or never-created sandbox is a no-op. Driver teardown errors
    /// are logged and swallowed so cleanup never blocks shutdown.
    pub async fn release(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.as_mut() {
            if handle.alive {
                if let Err(e) = self.driver.destroy(&handle.id).await {
                    warn!("Sandbox teardown failed for {}: {}", handle.id, e);
                }
                handle.alive = false;
            }
        }
    }

    /// Current liveness of the session's sandbox
    pub async fn status(&self) -> SandboxStatus {
        match self.handle.lock().await.as_ref() {
            None => SandboxStatus::NotCreated,
            Some(handle) if handle.alive => SandboxStatus::Live,
            Some(_) => SandboxStatus::Released,
        }
    }
}
