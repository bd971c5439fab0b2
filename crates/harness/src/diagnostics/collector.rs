//! Failure diagnostics collector.
//!
//! On any reported test exception the collector decides whether to gather
//! cluster artifacts: a diagnostic bundle scoped to the time since the test
//! started, plus `oc adm inspect` output for the failing test's functional
//! area. Collection is strictly best-effort; every error here is logged and
//! swallowed so diagnostics never mask the original failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cluster::CommandRunner;
use crate::diagnostics::store::DiagnosticStore;
use crate::item::{Marker, TestItem};
use common::constants::{namespaces, TIMEOUT_5MIN};
use common::error::TestError;

/// Subdirectory name keyed by the triggering hook.
const EXCEPTION_HOOK_DIR: &str = "exception_interact";

/// Nested subdirectory for inspect output.
const INSPECT_DIR: &str = "inspect_collection";

const INSPECT_BASE_COMMAND: [&str; 2] = ["adm", "inspect"];

/// Functional areas with dedicated namespace collection on failure.
const NAMESPACE_COLLECTION: [(&str, &[&str]); 3] = [
    ("storage", &[namespaces::OPENSHIFT_STORAGE]),
    ("network", &[namespaces::OPENSHIFT_NMSTATE]),
    ("virt", &[]),
];

/// Compute the collection window in seconds: time since the recorded start,
/// or a fixed five-minute default when no positive start time is known.
/// This fallback never fails.
fn collection_window(start_time: Option<i64>, now: i64) -> i64 {
    match start_time {
        Some(start) if start > 0 => now - start,
        _ => {
            warn!(
                "Could not get start time of test. Collecting diagnostics for last {}s",
                TIMEOUT_5MIN.as_secs()
            );
            TIMEOUT_5MIN.as_secs() as i64
        }
    }
}

/// Build the `namespace/<name>` target list for the failing test's
/// functional area, including conditional hardware namespaces.
fn inspect_namespace_targets(item: &TestItem) -> String {
    let area = NAMESPACE_COLLECTION
        .iter()
        .find(|(key, _)| item.path().contains(&format!("tests/{key}/")));

    let Some((area, base_namespaces)) = area else {
        warn!(
            "{} does not require special data collection on failure",
            item.full_name()
        );
        return String::new();
    };

    let mut targets: Vec<&str> = base_namespaces.to_vec();
    if *area == "virt" {
        if item.has_marker(&Marker::Gpu) {
            targets.push(namespaces::NVIDIA_GPU_OPERATOR);
        }
        if item.has_marker(&Marker::Swap) {
            targets.push(namespaces::WASP);
        }
    }

    targets
        .iter()
        .map(|namespace| format!("namespace/{namespace}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Failure diagnostics collector.
pub struct Collector {
    enabled: bool,
    base_directory: PathBuf,
    current_directory: PathBuf,
    bundle_command: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl Collector {
    pub fn new(enabled: bool, base_directory: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            enabled,
            base_directory: base_directory.clone(),
            current_directory: base_directory,
            bundle_command: vec!["adm".to_string(), "must-gather".to_string()],
            runner,
        }
    }

    /// Override the external diagnostic-bundle command (`oc` arguments).
    pub fn with_bundle_command(mut self, command: Vec<String>) -> Self {
        self.bundle_command = command;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Current collection directory; per-test while a test is running.
    pub fn directory(&self) -> &Path {
        &self.current_directory
    }

    /// Point collection at the running test's own subdirectory. Set
    /// irrespective of whether collection is enabled so session-scoped logs
    /// always have a destination.
    pub fn set_test_directory(&mut self, item: &TestItem) {
        self.current_directory = self.base_directory.join(item.path()).join(item.name());
    }

    /// Reset collection to the base directory after each test.
    pub fn reset_directory(&mut self) {
        self.current_directory = self.base_directory.clone();
    }

    /// Handle one exception interaction event.
    ///
    /// Logs the full failure text unconditionally, then collects a
    /// diagnostic bundle and per-area inspect output when enabled. Never
    /// returns an error.
    pub async fn on_exception(
        &self,
        store: Option<&DiagnosticStore>,
        item: &TestItem,
        test_error: &TestError,
        failure_text: &str,
    ) {
        error!("{failure_text}");

        if !self.enabled || item.has_marker(&Marker::SkipMustGatherCollection) {
            return;
        }

        let test_name = item.full_name();
        info!("Diagnostic collection is enabled for {test_name}.");
        let inspect_targets = inspect_namespace_targets(item);

        if test_error.skips_diagnostics() {
            warn!("Diagnostic collection would be skipped for exception: {test_error}");
            return;
        }

        let start_time = match store.map(|store| store.get_start_time(&test_name)) {
            Some(Ok(start_time)) => start_time,
            Some(Err(store_error)) => {
                warn!("Error: {store_error} in accessing the start-time store.");
                None
            }
            None => None,
        };
        let window = collection_window(start_time, chrono::Utc::now().timestamp());

        let collection_dir = self.current_directory.join(EXCEPTION_HOOK_DIR);
        self.collect_bundle(window, &collection_dir).await;

        if !inspect_targets.is_empty() {
            let inspect_dir = collection_dir.join(INSPECT_DIR);
            self.collect_inspect(&inspect_targets, window, &inspect_dir)
                .await;
        }
    }

    async fn collect_bundle(&self, window: i64, target_dir: &Path) {
        let since = format!("--since={window}s");
        let dest_dir = format!("--dest-dir={}", target_dir.display());
        let mut args: Vec<&str> = self.bundle_command.iter().map(String::as_str).collect();
        args.push(&since);
        args.push(&dest_dir);

        match self.runner.run("oc", &args).await {
            Ok(output) if !output.success() => {
                warn!(
                    status = output.status,
                    stderr = %output.stderr.trim(),
                    "Diagnostic bundle collection failed"
                );
            }
            Ok(_) => {}
            Err(run_error) => {
                warn!("Failed to collect diagnostic bundle: {run_error}");
            }
        }
    }

    async fn collect_inspect(&self, targets: &str, window: i64, target_dir: &Path) {
        let since = format!("--since={window}s");
        let dest_dir = format!("--dest-dir={}", target_dir.display());
        let mut args: Vec<&str> = INSPECT_BASE_COMMAND.to_vec();
        args.extend(targets.split(' '));
        args.push(&since);
        args.push(&dest_dir);

        info!("running inspect command: oc {}", args.join(" "));
        match self.runner.run("oc", &args).await {
            Ok(output) if !output.success() => {
                warn!(
                    status = output.status,
                    stderr = %output.stderr.trim(),
                    "Inspect collection failed"
                );
            }
            Ok(_) => {}
            Err(run_error) => {
                warn!("Failed to collect inspect output: {run_error}");
            }
        }
    }
}
