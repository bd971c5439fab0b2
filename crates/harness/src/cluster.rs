//! Cluster command plumbing.
//!
//! All cluster access goes through external `oc` processes behind the
//! [`CommandRunner`] seam so the guard, the diagnostics collector, and test
//! bodies can be exercised against a recording fake. The resource-level
//! semantics of those commands belong to the cluster, not to this harness.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Cluster access errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Could not determine the cluster API server host")]
    ApiHostNotFound,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse command output as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Captured output of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

impl From<ClusterError> for common::error::TestError {
    fn from(err: ClusterError) -> Self {
        common::error::TestError::Cluster(err.to_string())
    }
}

/// Seam for running external cluster commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, capturing output. A non-zero exit is
    /// returned as `Ok` with the captured status; only spawn failures error.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ClusterError>;
}

/// Real command runner backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OcRunner;

#[async_trait]
impl CommandRunner for OcRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ClusterError> {
        debug!(command = %format!("{program} {}", args.join(" ")), "Running cluster command");
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ClusterError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Thin cluster client over the command seam plus an HTTP probe.
pub struct ClusterClient {
    runner: Arc<dyn CommandRunner>,
    http_client: reqwest::Client,
}

impl ClusterClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Result<Self, ClusterError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            runner,
            http_client,
        })
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        self.runner.clone()
    }

    /// Run `oc` with the given arguments, erroring on non-zero exit.
    pub async fn oc(&self, args: &[&str]) -> Result<CommandOutput, ClusterError> {
        let output = self.runner.run("oc", args).await?;
        if !output.success() {
            return Err(ClusterError::CommandFailed {
                command: format!("oc {}", args.join(" ")),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Run `oc ... -o json` and parse the resource document.
    pub async fn oc_json(&self, args: &[&str]) -> Result<serde_json::Value, ClusterError> {
        let mut args = args.to_vec();
        args.extend(["-o", "json"]);
        let output = self.oc(&args).await?;
        Ok(serde_json::from_str(&output.stdout)?)
    }

    /// The API server host the current context points at.
    pub async fn api_server_host(&self) -> Result<String, ClusterError> {
        let output = self.oc(&["whoami", "--show-server"]).await?;
        let host = output.stdout.trim();
        if host.is_empty() {
            return Err(ClusterError::ApiHostNotFound);
        }
        Ok(host.to_string())
    }

    /// Probe the artifact server; reachability is advisory only.
    pub async fn check_artifact_server(&self, url: &str) -> bool {
        self.http_client
            .get(url)
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }
}

/// Derive the artifact-server host from the cluster API URL:
/// `https://api.<cluster-domain>:6443` maps to
/// `artifactory.<cluster-domain>`.
pub fn artifact_server_url(api_host: &str) -> String {
    let host = api_host
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split(':').next().unwrap_or(host);
    match host.strip_prefix("api.") {
        Some(domain) => format!("artifactory.{domain}"),
        None => format!("artifactory.{host}"),
    }
}
