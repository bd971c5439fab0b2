//! Cluster-wide constants shared by the harness and the suites.

use std::time::Duration;

/// Namespace names referenced by failure diagnostics and suite checks.
pub mod namespaces {
    pub const OPENSHIFT_CNV: &str = "openshift-cnv";
    pub const OPENSHIFT_STORAGE: &str = "openshift-storage";
    pub const OPENSHIFT_NMSTATE: &str = "openshift-nmstate";
    pub const NVIDIA_GPU_OPERATOR: &str = "nvidia-gpu-operator";
    pub const WASP: &str = "wasp";

    /// Namespace holding the run-in-progress guard config map.
    pub const RUN_IN_PROGRESS: &str = "virt-tests-run-in-progress";
}

/// Name of the run-in-progress guard config map.
pub const RUN_IN_PROGRESS_CONFIG_MAP: &str = "run-in-progress";

pub const TIMEOUT_1MIN: Duration = Duration::from_secs(60);
pub const TIMEOUT_5MIN: Duration = Duration::from_secs(300);
pub const TIMEOUT_10MIN: Duration = Duration::from_secs(600);

/// Baseline architecture marker applied to every collected test.
pub const X86_64: &str = "x86_64";

/// Report annotation keys surfaced in the HTML report.
pub const QUARANTINED: &str = "quarantined";
pub const SETUP_ERROR: &str = "setup_error";
