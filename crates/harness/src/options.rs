//! Command-line option registry.
//!
//! Flags are grouped by concern (upgrade, matrix selection, OS selection,
//! storage, data collection, session) and validated as a whole before any
//! collection starts. Invalid combinations are configuration errors and
//! abort the run.

use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Option validation errors. All of these abort before collection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Running with --upgrade ocp: Missing --ocp-image")]
    MissingOcpImage,

    #[error("Missing --cnv-version")]
    MissingCnvVersion,

    #[error("Missing --cnv-image")]
    MissingCnvImage,

    #[error(
        "Two OCP images are needed to perform EUS-to-EUS upgrade with --eus-ocp-images. \
         Provided images: {provided:?}"
    )]
    BadEusImages { provided: Option<String> },

    #[error(
        "Data will not be collected because `--data-collector-output-dir` is set \
         without `--data-collector`"
    )]
    OutputDirWithoutCollector,

    #[error("os matrix and latest os options are mutually exclusive.")]
    OsMatrixConflict,
}

/// Upgrade lanes selectable with `--upgrade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UpgradeLane {
    Cnv,
    Ocp,
    Eus,
}

/// Upgrade lanes selectable with `--upgrade-custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CustomUpgradeLane {
    Cnv,
    Ocp,
}

/// Product whose upgrade tests a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradedProduct {
    Cnv,
    Ocp,
    Eus,
}

impl UpgradedProduct {
    /// Marker name selecting this product's upgrade tests.
    pub fn upgrade_marker_name(&self) -> &'static str {
        match self {
            UpgradedProduct::Cnv => "cnv_upgrade",
            UpgradedProduct::Ocp => "ocp_upgrade",
            UpgradedProduct::Eus => "eus_upgrade",
        }
    }
}

/// Source lane for the CNV index image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CnvSource {
    Production,
    Fbc,
    #[default]
    Osbs,
}

impl fmt::Display for CnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CnvSource::Production => write!(f, "production"),
            CnvSource::Fbc => write!(f, "fbc"),
            CnvSource::Osbs => write!(f, "osbs"),
        }
    }
}

/// Subscription channel for the CNV index image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SubscriptionChannel {
    #[default]
    Stable,
    Candidate,
    Nightly,
}

/// The full command-line option registry for a test run.
#[derive(Debug, Clone, Parser)]
#[command(name = "virt-tests", about = "Virtualization environment end-to-end test runner")]
pub struct RunOptions {
    /// Run OCP or CNV or EUS upgrade tests
    #[arg(long, value_enum, help_heading = "Upgrade")]
    pub upgrade: Option<UpgradeLane>,

    /// Run OCP or CNV upgrade tests with custom lanes
    #[arg(long = "upgrade-custom", value_enum, help_heading = "Upgrade")]
    pub upgrade_custom: Option<CustomUpgradeLane>,

    /// CNV version to install or upgrade to
    #[arg(long, help_heading = "Upgrade")]
    pub cnv_version: Option<String>,

    /// Path to CNV index-image
    #[arg(long, help_heading = "Upgrade")]
    pub cnv_image: Option<String>,

    /// CNV source lane
    #[arg(long, value_enum, default_value_t, help_heading = "Upgrade")]
    pub cnv_source: CnvSource,

    /// Subscription channel for CNV index image
    #[arg(long, value_enum, default_value_t, help_heading = "Upgrade")]
    pub cnv_channel: SubscriptionChannel,

    /// OCP image to upgrade to
    #[arg(long, help_heading = "Upgrade")]
    pub ocp_image: Option<String>,

    /// Comma-separated OCP images to use for EUS-to-EUS upgrade
    #[arg(long, help_heading = "Upgrade")]
    pub eus_ocp_images: Option<String>,

    /// Target CNV version for EUS upgrade
    #[arg(long, help_heading = "Upgrade")]
    pub eus_cnv_target_version: Option<String>,

    /// Skip the fixture that changes the default storage class in upgrade lanes
    #[arg(long, help_heading = "Upgrade")]
    pub upgrade_skip_default_sc_setup: bool,

    /// Run install tests
    #[arg(long, help_heading = "Upgrade")]
    pub install: bool,

    /// Storage class matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub storage_class_matrix: Option<Vec<String>>,

    /// Bridge device matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub bridge_device_matrix: Option<Vec<String>>,

    /// RHEL OS matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub rhel_os_matrix: Option<Vec<String>>,

    /// Windows OS matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub windows_os_matrix: Option<Vec<String>>,

    /// Fedora OS matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub fedora_os_matrix: Option<Vec<String>>,

    /// CentOS matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub centos_os_matrix: Option<Vec<String>>,

    /// External provider matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub provider_matrix: Option<Vec<String>>,

    /// VM volumes matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub vm_volumes_matrix: Option<Vec<String>>,

    /// RunStrategy matrix to use
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub run_strategy_matrix: Option<Vec<String>>,

    /// Sysprep resource types to use (ConfigMap, Secret)
    #[arg(long, value_delimiter = ',', help_heading = "Matrix")]
    pub sysprep_source_matrix: Option<Vec<String>>,

    /// Run matrix tests with latest RHEL OS
    #[arg(long, help_heading = "OS")]
    pub latest_rhel: bool,

    /// Run matrix tests with latest Fedora OS
    #[arg(long, help_heading = "OS")]
    pub latest_fedora: bool,

    /// Run matrix tests with latest Windows OS
    #[arg(long, help_heading = "OS")]
    pub latest_windows: bool,

    /// Run matrix tests with latest CentOS
    #[arg(long, help_heading = "OS")]
    pub latest_centos: bool,

    /// Overwrite the default storage class in storage_class_matrix
    #[arg(long, help_heading = "Storage")]
    pub default_storage_class: Option<String>,

    /// Skip storage class check in the cluster sanity check
    #[arg(long, help_heading = "ClusterSanity")]
    pub cluster_sanity_skip_storage_check: bool,

    /// Skip nodes check in the cluster sanity check
    #[arg(long, help_heading = "ClusterSanity")]
    pub cluster_sanity_skip_nodes_check: bool,

    /// Skip the cluster sanity check entirely
    #[arg(long, help_heading = "ClusterSanity")]
    pub cluster_sanity_skip_check: bool,

    /// Collect diagnostic bundle/inspect data on failure
    #[arg(long, help_heading = "DataCollector")]
    pub data_collector: bool,

    /// Diagnostic output dir; only valid together with `--data-collector`
    #[arg(long, help_heading = "DataCollector")]
    pub data_collector_output_dir: Option<PathBuf>,

    /// Path to the session log file
    #[arg(long, default_value = "virt-tests.log", help_heading = "DataCollector")]
    pub log_file: PathBuf,

    /// Skip the deprecated-API audit tests that otherwise always run
    #[arg(long, help_heading = "DeprecatedApi")]
    pub skip_deprecated_api_test: bool,

    /// Run the leftovers collector (off by default)
    #[arg(long, help_heading = "LeftoversCollector")]
    pub leftovers_collector: bool,

    /// Path to the scale test params file
    #[arg(
        long,
        default_value = "tests/scale/scale_params.yaml",
        help_heading = "Scale"
    )]
    pub scale_params_file: PathBuf,

    /// Session id to use for the test run (freshly generated when omitted)
    #[arg(long, help_heading = "Session")]
    pub session_id: Option<String>,

    /// Skip artifact server checks for tests that do not need server access
    #[arg(long, help_heading = "Session")]
    pub skip_artifactory_check: bool,

    /// Skip verification that the cluster has all capabilities required by
    /// special-infra marked tests
    #[arg(long, help_heading = "Session")]
    pub skip_virt_sanity_check: bool,

    /// Marker expression selecting which tests run
    #[arg(short = 'm', long = "markers", help_heading = "Selection")]
    pub markers: Option<String>,

    /// Collect and list tests without running them
    #[arg(long, help_heading = "Selection")]
    pub collect_only: bool,
}

impl RunOptions {
    /// Validate flag combinations. Called once, before collection.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.upgrade == Some(UpgradeLane::Ocp) && self.ocp_image.is_none() {
            return Err(OptionsError::MissingOcpImage);
        }

        if self.upgrade == Some(UpgradeLane::Cnv) {
            if self.cnv_version.is_none() {
                return Err(OptionsError::MissingCnvVersion);
            }
            if self.cnv_image.is_none() && self.cnv_source != CnvSource::Production {
                return Err(OptionsError::MissingCnvImage);
            }
        }

        if self.upgrade == Some(UpgradeLane::Eus) {
            let images = self.eus_ocp_images.as_deref().unwrap_or_default();
            if images.split(',').filter(|image| !image.is_empty()).count() != 2 {
                return Err(OptionsError::BadEusImages {
                    provided: self.eus_ocp_images.clone(),
                });
            }
        }

        if self.data_collector_output_dir.is_some() && !self.data_collector {
            return Err(OptionsError::OutputDirWithoutCollector);
        }

        let rhel_violation = self.rhel_os_matrix.is_some() && self.latest_rhel;
        let windows_violation = self.windows_os_matrix.is_some() && self.latest_windows;
        let fedora_violation = self.fedora_os_matrix.is_some() && self.latest_fedora;
        let centos_violation = self.centos_os_matrix.is_some() && self.latest_centos;
        if rhel_violation || windows_violation || fedora_violation || centos_violation {
            return Err(OptionsError::OsMatrixConflict);
        }

        Ok(())
    }

    /// Resolve the product whose upgrade tests this run executes.
    ///
    /// Defaults to CNV so upgrade-test dependency naming stays stable even
    /// when no upgrade lane is selected.
    pub fn upgraded_product(&self) -> UpgradedProduct {
        match (self.upgrade, self.upgrade_custom) {
            (Some(UpgradeLane::Ocp), _) => UpgradedProduct::Ocp,
            (Some(UpgradeLane::Eus), _) => UpgradedProduct::Eus,
            (Some(UpgradeLane::Cnv), _) => UpgradedProduct::Cnv,
            (None, Some(CustomUpgradeLane::Ocp)) => UpgradedProduct::Ocp,
            (None, Some(CustomUpgradeLane::Cnv)) | (None, None) => UpgradedProduct::Cnv,
        }
    }

    /// True when any upgrade lane (regular or custom) is selected.
    pub fn upgrade_lane_selected(&self) -> bool {
        self.upgrade.is_some() || self.upgrade_custom.is_some()
    }

    /// The explicit `--<matrix>` overrides, as (config key, requested ids).
    pub fn matrix_overrides(&self) -> Vec<(&'static str, &[String])> {
        let mut overrides: Vec<(&'static str, &[String])> = Vec::new();
        let pairs: [(&'static str, &Option<Vec<String>>); 10] = [
            ("storage_class_matrix", &self.storage_class_matrix),
            ("bridge_device_matrix", &self.bridge_device_matrix),
            ("rhel_os_matrix", &self.rhel_os_matrix),
            ("windows_os_matrix", &self.windows_os_matrix),
            ("fedora_os_matrix", &self.fedora_os_matrix),
            ("centos_os_matrix", &self.centos_os_matrix),
            ("provider_matrix", &self.provider_matrix),
            ("vm_volumes_matrix", &self.vm_volumes_matrix),
            ("run_strategy_matrix", &self.run_strategy_matrix),
            ("sysprep_source_matrix", &self.sysprep_source_matrix),
        ];
        for (key, values) in pairs {
            if let Some(values) = values {
                overrides.push((key, values.as_slice()));
            }
        }
        overrides
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunOptions {
        RunOptions::try_parse_from(
            std::iter::once("virt-tests").chain(args.iter().copied()),
        )
        .expect("options should parse")
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&[]);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.cnv_source, CnvSource::Osbs);
        assert_eq!(opts.cnv_channel, SubscriptionChannel::Stable);
        assert_eq!(opts.log_file, PathBuf::from("virt-tests.log"));
        assert_eq!(opts.upgraded_product(), UpgradedProduct::Cnv);
        assert!(!opts.upgrade_lane_selected());
    }

    #[test]
    fn test_upgrade_ocp_requires_image() {
        let opts = parse(&["--upgrade", "ocp"]);
        assert_eq!(opts.validate(), Err(OptionsError::MissingOcpImage));

        let opts = parse(&["--upgrade", "ocp", "--ocp-image", "quay.io/ocp:4.17"]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_upgrade_cnv_requires_version() {
        let opts = parse(&["--upgrade", "cnv"]);
        assert_eq!(opts.validate(), Err(OptionsError::MissingCnvVersion));
    }

    #[test]
    fn test_upgrade_cnv_requires_image_unless_production() {
        let opts = parse(&["--upgrade", "cnv", "--cnv-version", "4.17.0"]);
        assert_eq!(opts.validate(), Err(OptionsError::MissingCnvImage));

        let opts = parse(&[
            "--upgrade",
            "cnv",
            "--cnv-version",
            "4.17.0",
            "--cnv-source",
            "production",
        ]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_eus_requires_exactly_two_images() {
        let opts = parse(&["--upgrade", "eus"]);
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::BadEusImages { .. })
        ));

        let opts = parse(&["--upgrade", "eus", "--eus-ocp-images", "a"]);
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::BadEusImages { .. })
        ));

        let opts = parse(&["--upgrade", "eus", "--eus-ocp-images", "a,b"]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_output_dir_requires_collector() {
        let opts = parse(&["--data-collector-output-dir", "/tmp/collected"]);
        assert_eq!(opts.validate(), Err(OptionsError::OutputDirWithoutCollector));

        let opts = parse(&[
            "--data-collector",
            "--data-collector-output-dir",
            "/tmp/collected",
        ]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_os_matrix_and_latest_are_mutually_exclusive() {
        let opts = parse(&["--rhel-os-matrix", "rhel-9-5", "--latest-rhel"]);
        assert_eq!(opts.validate(), Err(OptionsError::OsMatrixConflict));

        let opts = parse(&["--windows-os-matrix", "win-2022", "--latest-windows"]);
        assert_eq!(opts.validate(), Err(OptionsError::OsMatrixConflict));

        let opts = parse(&["--rhel-os-matrix", "rhel-9-5", "--latest-windows"]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_upgraded_product_resolution() {
        assert_eq!(
            parse(&["--upgrade", "ocp", "--ocp-image", "img"]).upgraded_product(),
            UpgradedProduct::Ocp
        );
        assert_eq!(
            parse(&["--upgrade-custom", "ocp"]).upgraded_product(),
            UpgradedProduct::Ocp
        );
        assert_eq!(
            parse(&["--upgrade-custom", "cnv"]).upgraded_product(),
            UpgradedProduct::Cnv
        );
        assert_eq!(parse(&[]).upgraded_product(), UpgradedProduct::Cnv);
    }

    #[test]
    fn test_matrix_overrides_split_on_commas() {
        let opts = parse(&["--storage-class-matrix", "nfs,ceph"]);
        let overrides = opts.matrix_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].0, "storage_class_matrix");
        assert_eq!(overrides[0].1, ["nfs".to_string(), "ceph".to_string()]);
    }
}
