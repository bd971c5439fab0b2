//! Run-in-progress guard.
//!
//! A singleton marker (namespace plus config map) created at session start
//! and removed at session end. Its presence tells other invocations that a
//! run is already active against this cluster; deploying over an existing
//! guard fails loudly so stale or concurrent runs are caught before any
//! test executes.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::cluster::{ClusterError, CommandRunner};
use common::constants::{namespaces, RUN_IN_PROGRESS_CONFIG_MAP};

/// Guard deployment and teardown errors.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(
        "A test run is already in progress on this cluster \
         (config map {RUN_IN_PROGRESS_CONFIG_MAP} exists in namespace {0}): {1}"
    )]
    RunInProgress(&'static str, String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// The singleton run-in-progress marker resource.
pub struct RunInProgressGuard {
    runner: Arc<dyn CommandRunner>,
    session_id: String,
}

impl RunInProgressGuard {
    pub fn new(runner: Arc<dyn CommandRunner>, session_id: impl Into<String>) -> Self {
        Self {
            runner,
            session_id: session_id.into(),
        }
    }

    /// Whether a guard config map already exists on the cluster.
    pub async fn exists(&self) -> Result<bool, GuardError> {
        let output = self
            .runner
            .run(
                "oc",
                &[
                    "get",
                    "configmap",
                    RUN_IN_PROGRESS_CONFIG_MAP,
                    "-n",
                    namespaces::RUN_IN_PROGRESS,
                    "--ignore-not-found",
                    "-o",
                    "name",
                ],
            )
            .await?;
        Ok(output.success() && !output.stdout.trim().is_empty())
    }

    /// Create the guard namespace and config map.
    ///
    /// Fails with [`GuardError::RunInProgress`] if a guard already exists.
    pub async fn deploy(&self) -> Result<(), GuardError> {
        if self.exists().await? {
            let output = self
                .runner
                .run(
                    "oc",
                    &[
                        "get",
                        "configmap",
                        RUN_IN_PROGRESS_CONFIG_MAP,
                        "-n",
                        namespaces::RUN_IN_PROGRESS,
                        "-o",
                        "jsonpath={.data}",
                    ],
                )
                .await?;
            return Err(GuardError::RunInProgress(
                namespaces::RUN_IN_PROGRESS,
                output.stdout.trim().to_string(),
            ));
        }

        // Namespace creation tolerates leftovers from a torn-down run.
        let namespace = self
            .runner
            .run("oc", &["create", "namespace", namespaces::RUN_IN_PROGRESS])
            .await?;
        if !namespace.success() && !namespace.stderr.contains("AlreadyExists") {
            return Err(ClusterError::CommandFailed {
                command: format!("oc create namespace {}", namespaces::RUN_IN_PROGRESS),
                status: namespace.status,
                stderr: namespace.stderr.trim().to_string(),
            }
            .into());
        }

        let session_literal = format!("--from-literal=session-id={}", self.session_id);
        let config_map = self
            .runner
            .run(
                "oc",
                &[
                    "create",
                    "configmap",
                    RUN_IN_PROGRESS_CONFIG_MAP,
                    "-n",
                    namespaces::RUN_IN_PROGRESS,
                    &session_literal,
                ],
            )
            .await?;
        if !config_map.success() {
            // A concurrent run won the race between the existence check and
            // the create; surface it as a run-in-progress failure.
            return Err(GuardError::RunInProgress(
                namespaces::RUN_IN_PROGRESS,
                config_map.stderr.trim().to_string(),
            ));
        }

        info!(
            session_id = %self.session_id,
            "Deployed run-in-progress guard"
        );
        Ok(())
    }

    /// Remove the guard config map and namespace.
    ///
    /// Idempotent: absence of either resource is not an error, and calling
    /// teardown twice in succession never fails.
    pub async fn teardown(&self) -> Result<(), GuardError> {
        for args in [
            [
                "delete",
                "configmap",
                RUN_IN_PROGRESS_CONFIG_MAP,
                "-n",
                namespaces::RUN_IN_PROGRESS,
                "--ignore-not-found",
            ]
            .as_slice(),
            [
                "delete",
                "namespace",
                namespaces::RUN_IN_PROGRESS,
                "--ignore-not-found",
            ]
            .as_slice(),
        ] {
            let output = self.runner.run("oc", args).await?;
            if !output.success() && !output.stderr.contains("NotFound") {
                warn!(
                    command = %format!("oc {}", args.join(" ")),
                    stderr = %output.stderr.trim(),
                    "Guard teardown command failed"
                );
            }
        }
        Ok(())
    }
}
