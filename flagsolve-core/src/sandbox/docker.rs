//! Docker-backed sandbox driver for the Kali tool image

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use futures::StreamExt;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::{Error, Result};

use super::{ExecOutput, SandboxDriver};

/// Sandbox driver backed by a local Docker daemon
pub struct DockerSandbox {
    docker: Docker,
    config: SandboxConfig,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon and verify it is reachable
    pub async fn connect(config: SandboxConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;

        docker
            .ping()
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("Cannot connect to Docker: {}", e)))?;

        Ok(Self { docker, config })
    }
}

#[async_trait]
impl SandboxDriver for DockerSandbox {
    async fn create(&self) -> Result<String> {
        let name = format!("{}-{}", self.config.container_prefix, Uuid::new_v4());

        let host_config = HostConfig {
            cap_add: Some(vec!["NET_ADMIN".to_string(), "NET_RAW".to_string()]),
            memory: Some(4 * 1024 * 1024 * 1024),
            memory_swap: Some(4 * 1024 * 1024 * 1024),
            pids_limit: Some(2048),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(self.config.image.clone()),
            hostname: Some(self.config.container_prefix.clone()),
            host_config: Some(host_config),
            tty: Some(true),
            cmd: Some(vec![
                "tail".to_string(),
                "-f".to_string(),
                "/dev/null".to_string(),
            ]),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: Some(name.clone()),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("Container creation failed: {}", e)))?;

        self.docker
            .start_container(&name, None::<StartContainerOptions>)
            .await
            .map_err(|e| Error::SandboxUnavailable(format!("Container start failed: {}", e)))?;

        info!("Sandbox container started: {}", response.id);
        Ok(response.id)
    }

    async fn run(&self, handle: &str, command: &str, timeout: Duration) -> Result<ExecOutput> {
        debug!("Executing in sandbox: {}", command);

        let exec_config = CreateExecOptions {
            cmd: Some(vec!["sh".to_string(), "-c".to_string(), command.to_string()]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self.docker.create_exec(handle, exec_config).await?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut total_size: usize = 0;
        let mut truncated = false;
        let max_size = self.config.max_output_bytes;

        if let StartExecResults::Attached {
            output: mut stream, ..
        } = self.docker.start_exec(&exec.id, None).await?
        {
            let stream_result = tokio::time::timeout(timeout, async {
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(LogOutput::StdOut { message }) => {
                            if !truncated {
                                let chunk = String::from_utf8_lossy(&message);
                                total_size += chunk.len();
                                if total_size > max_size {
                                    truncated = true;
                                    stdout.push_str("\n[OUTPUT TRUNCATED - size limit exceeded]");
                                } else {
                                    stdout.push_str(&chunk);
                                }
                            }
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            if !truncated {
                                let chunk = String::from_utf8_lossy(&message);
                                total_size += chunk.len();
                                if total_size > max_size {
                                    truncated = true;
                                    stderr.push_str("\n[OUTPUT TRUNCATED - size limit exceeded]");
                                } else {
                                    stderr.push_str(&chunk);
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Error reading exec output: {}", e);
                        }
                    }
                }
            })
            .await;

            if stream_result.is_err() {
                warn!(
                    "Command timed out after {} seconds: {}",
                    timeout.as_secs(),
                    command
                );
                return Ok(ExecOutput::from_timeout(stdout, timeout));
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
            timed_out: false,
        })
    }

    async fn destroy(&self, handle: &str) -> Result<()> {
        info!("Destroying sandbox container: {}", handle);

        // Unknown container means it is already gone; that is fine.
        match self
            .docker
            .stop_container(
                handle,
                Some(StopContainerOptions {
                    t: Some(5),
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(()),
            Err(e) => warn!("Failed to stop container {}: {}", handle, e),
        }

        match self
            .docker
            .remove_container(
                handle,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
