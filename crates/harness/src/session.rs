//! Session lifecycle.
//!
//! One-time setup at session start and one-time teardown at session end.
//! Start is a strict ordered sequence where any failure aborts the run;
//! finish is best-effort, in an order that matters for correctness but
//! never turns a cleanup failure into a run failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cluster::{
    artifact_server_url, ClusterClient, ClusterError, CommandRunner, OcRunner,
};
use crate::config::{Arch, ConfigError, OsLogin, RunConfig};
use crate::diagnostics::DiagnosticStore;
use crate::guard::{GuardError, RunInProgressGuard};
use crate::logging::{self, LogListener, LoggingError};
use crate::options::{OptionsError, RunOptions};
use crate::report::RunSummary;

const OS_LOGIN_USERNAME_VAR: &str = "OS_LOGIN_USERNAME";
const OS_LOGIN_PASSWORD_VAR: &str = "OS_LOGIN_PASSWORD";

/// Session start errors. All abort the run before any test executes.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Session setup failed: {context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

fn io_error(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> SessionError {
    let context = context.into();
    move |source| SessionError::Io { context, source }
}

fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Root scope for all shared run resources.
pub struct Session {
    pub options: RunOptions,
    pub config: Arc<RunConfig>,
    pub cluster: Arc<ClusterClient>,
    session_id: String,
    tmp_dir: PathBuf,
    log_listener: Option<LogListener>,
    guard: Option<RunInProgressGuard>,
}

impl Session {
    /// Start a session against the live cluster.
    pub async fn start(options: RunOptions) -> Result<Self, SessionError> {
        Self::start_with_runner(options, Arc::new(OcRunner)).await
    }

    /// Start a session with an injected command runner (test seam).
    pub async fn start_with_runner(
        options: RunOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, SessionError> {
        // 1. Flag combinations are checked before anything touches disk or
        //    cluster.
        options.validate()?;

        // 2. Make the temp dir unique per session so concurrent runs never
        //    collide.
        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(generate_session_id);
        let tmp_dir = std::env::temp_dir().join(format!("virt-tests-{session_id}"));
        std::fs::create_dir_all(&tmp_dir)
            .map_err(io_error(format!("creating temp dir {}", tmp_dir.display())))?;

        // 3. Static config layers; then reset the diagnostic artifact base
        //    directory, ignoring absence.
        let mut config = RunConfig::resolve(&options, Arch::detect())?;
        let _ = std::fs::remove_dir_all(&config.collector_base_directory);
        std::fs::create_dir_all(&config.collector_base_directory).map_err(io_error(format!(
            "creating collector dir {}",
            config.collector_base_directory.display()
        )))?;

        // 4. Remove a stale log file from a previous run, then start logging.
        match std::fs::remove_file(&options.log_file) {
            Ok(()) => {}
            Err(remove_error) if remove_error.kind() == std::io::ErrorKind::NotFound => {}
            Err(remove_error) => {
                return Err(io_error(format!(
                    "removing stale log file {}",
                    options.log_file.display()
                ))(remove_error))
            }
        }
        let logging_defaults = common::config::LoggingConfig::default();
        let log_listener = logging::init(&options.log_file, &logging_defaults.log_level)?;
        info!(session_id = %session_id, "Starting test session");

        // 5. Snapshot the full OS/storage matrices before any narrowing.
        config.snapshot_system_matrices();

        // 6. Latest-OS narrowing per family flag.
        config.apply_latest_os(&options);

        // 7. Explicit matrix overrides narrow by ordered intersection.
        config.apply_matrix_overrides(&options.matrix_overrides())?;

        // 8. Storage class, artifact server, and login resolution.
        let cluster = Arc::new(ClusterClient::new(runner)?);
        if !options.collect_only {
            config.resolve_default_storage_class(options.default_storage_class.as_deref())?;

            if !options.skip_artifactory_check {
                let api_host = cluster.api_server_host().await?;
                let server = artifact_server_url(&api_host);
                if !cluster
                    .check_artifact_server(&format!("https://{server}"))
                    .await
                {
                    warn!(server = %server, "Artifact server did not answer the reachability probe");
                }
                config.set_server_url(&server);
                config.os_login = resolve_os_login();
                config.ensure_required()?;
            }
        }

        // 9. The guard is created last so it only exists once every other
        //    start check has passed.
        let guard = if options.collect_only {
            None
        } else {
            let guard = RunInProgressGuard::new(cluster.runner(), &session_id);
            guard.deploy().await?;
            Some(guard)
        };

        Ok(Self {
            options,
            config: Arc::new(config),
            cluster,
            session_id,
            tmp_dir,
            log_listener: Some(log_listener),
            guard,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Best-effort session teardown.
    pub async fn finish(mut self, summary: &RunSummary) {
        let _ = std::fs::remove_dir_all(&self.tmp_dir);

        if let Some(guard) = self.guard.take() {
            if let Err(teardown_error) = guard.teardown().await {
                warn!("Guard teardown failed: {teardown_error}");
            }
        }

        summary.print();

        if self.options.data_collector {
            let store_file = DiagnosticStore::file_path_for(&self.config.collector_base_directory);
            info!("Removing store file {}", store_file.display());
            if let Err(remove_error) = std::fs::remove_file(&store_file) {
                if remove_error.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove store file {}: {remove_error}",
                        store_file.display()
                    );
                }
            }
        }

        prune_empty_dirs(&self.config.collector_base_directory);

        if let Some(mut listener) = self.log_listener.take() {
            listener.stop();
        }
    }
}

fn resolve_os_login() -> Option<OsLogin> {
    match (
        std::env::var(OS_LOGIN_USERNAME_VAR),
        std::env::var(OS_LOGIN_PASSWORD_VAR),
    ) {
        (Ok(username), Ok(password)) => Some(OsLogin { username, password }),
        _ => {
            warn!(
                "{OS_LOGIN_USERNAME_VAR}/{OS_LOGIN_PASSWORD_VAR} not set; guest login checks \
                 will be skipped"
            );
            None
        }
    }
}

/// Remove now-empty subdirectories under `root`, bottom-up. The root itself
/// is kept.
fn prune_empty_dirs(root: &Path) {
    fn prune(dir: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return false;
        };
        let mut empty = true;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if prune(&path) {
                    let _ = std::fs::remove_dir(&path);
                } else {
                    empty = false;
                }
            } else {
                empty = false;
            }
        }
        // Re-check: a child may have failed to delete.
        empty && std::fs::read_dir(dir).map(|mut e| e.next().is_none()).unwrap_or(false)
    }

    if root.exists() {
        prune(root);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::testing::RecordingRunner;
    use clap::Parser;
    use serial_test::serial;

    fn options(args: &[&str]) -> RunOptions {
        RunOptions::try_parse_from(std::iter::once("virt-tests").chain(args.iter().copied()))
            .expect("options should parse")
    }

    #[test]
    fn test_generate_session_id_is_short_and_unique() {
        let first = generate_session_id();
        let second = generate_session_id();
        assert_eq!(first.len(), 8);
        assert_ne!(first, second);
    }

    #[test]
    fn test_prune_empty_dirs_keeps_root_and_populated_dirs() {
        let root = tempfile::tempdir().unwrap();
        let empty_branch = root.path().join("a/b/c");
        std::fs::create_dir_all(&empty_branch).unwrap();
        let populated = root.path().join("kept");
        std::fs::create_dir_all(&populated).unwrap();
        std::fs::write(populated.join("artifact.log"), "data").unwrap();

        prune_empty_dirs(root.path());

        assert!(root.path().exists());
        assert!(!root.path().join("a").exists());
        assert!(populated.join("artifact.log").exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_collect_only_session_skips_guard_and_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("virt-tests.log");
        let collector_dir = dir.path().join("collected");
        let runner = Arc::new(RecordingRunner::succeeding());

        let opts = options(&[
            "--collect-only",
            "--log-file",
            log_file.to_str().unwrap(),
            "--data-collector",
            "--data-collector-output-dir",
            collector_dir.to_str().unwrap(),
            "--session-id",
            "collectonly",
        ]);
        let session = Session::start_with_runner(opts, runner.clone())
            .await
            .unwrap();

        // No cluster commands at all: no guard, no server resolution.
        assert!(runner.recorded_calls().is_empty());
        assert!(session.config.default_storage_class.is_empty());
        assert_eq!(session.session_id(), "collectonly");
        assert!(session.tmp_dir().exists());

        session.finish(&RunSummary::default()).await;
    }

    #[tokio::test]
    #[serial]
    async fn test_session_start_deploys_guard_and_resolves_storage() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("virt-tests.log");
        let collector_dir = dir.path().join("collected");
        let runner = Arc::new(RecordingRunner::succeeding());

        let opts = options(&[
            "--skip-artifactory-check",
            "--log-file",
            log_file.to_str().unwrap(),
            "--data-collector",
            "--data-collector-output-dir",
            collector_dir.to_str().unwrap(),
            "--session-id",
            "guardtest",
        ]);
        let session = Session::start_with_runner(opts, runner.clone())
            .await
            .unwrap();

        assert_eq!(
            session.config.default_storage_class,
            "ocs-storagecluster-ceph-rbd-virtualization"
        );
        // Guard existence check, namespace create, config map create.
        let calls = runner.recorded_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].iter().any(|arg| arg.contains("session-id=guardtest")));

        session.finish(&RunSummary::default()).await;
        // Teardown ran: config map delete plus namespace delete.
        assert_eq!(runner.recorded_calls().len(), 5);
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_removes_store_file_and_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("virt-tests.log");
        let collector_dir = dir.path().join("collected");
        let runner = Arc::new(RecordingRunner::succeeding());

        let opts = options(&[
            "--collect-only",
            "--log-file",
            log_file.to_str().unwrap(),
            "--data-collector",
            "--data-collector-output-dir",
            collector_dir.to_str().unwrap(),
        ]);
        let session = Session::start_with_runner(opts, runner).await.unwrap();

        let store = DiagnosticStore::open(&collector_dir).unwrap();
        store.insert_start_time("tests/x.rs::test_a", 100).unwrap();
        drop(store);
        std::fs::create_dir_all(collector_dir.join("tests/virt/empty")).unwrap();

        session.finish(&RunSummary::default()).await;

        assert!(!DiagnosticStore::file_path_for(&collector_dir).exists());
        assert!(!collector_dir.join("tests").exists());
        assert!(collector_dir.exists());
    }
}
