//! Layered run configuration.
//!
//! The run configuration is built exactly once, at session start, from four
//! layers merged last-writer-wins per key: embedded static defaults, an
//! architecture override document, command-line overrides, and computed
//! values (server URLs, login credentials). After session start completes
//! the configuration is shared behind `Arc<RunConfig>` and is read-only for
//! the rest of the run.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::matrix::{Matrix, MatrixError};
use crate::options::{CnvSource, RunOptions, SubscriptionChannel, UpgradedProduct};

const DEFAULTS_YAML: &str = include_str!("config/defaults.yaml");
const S390X_YAML: &str = include_str!("config/s390x.yaml");

/// Default base directory for collected diagnostic artifacts.
const DATA_COLLECTOR_BASE_DIRECTORY: &str = "tests-collected-info";

/// Configuration errors. All fatal; the session never starts on one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("Unknown matrix: {key}")]
    UnknownMatrix { key: String },

    #[error("Default storage class {name} is not in storage_class_matrix")]
    UnknownStorageClass { name: String },

    #[error("storage_class_matrix is empty, cannot resolve a default storage class")]
    EmptyStorageClassMatrix,

    #[error("Required configuration key {key} is empty after session start")]
    MissingRequired { key: &'static str },
}

/// Target architecture for configuration overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    S390x,
}

impl Arch {
    /// Detect the architecture the runner itself is built for.
    pub fn detect() -> Self {
        if std::env::consts::ARCH == "s390x" {
            Arch::S390x
        } else {
            Arch::X86_64
        }
    }
}

/// OS login credentials used by guest checks.
#[derive(Debug, Clone, Deserialize)]
pub struct OsLogin {
    pub username: String,
    pub password: String,
}

/// The process-wide run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    matrices: BTreeMap<String, Matrix>,
    system_matrices: BTreeMap<String, Matrix>,
    pub default_storage_class: String,
    pub server_url: String,
    pub servers: BTreeMap<String, String>,
    pub version_explorer_url: String,
    pub os_login: Option<OsLogin>,
    pub upgraded_product: UpgradedProduct,
    pub cnv_source: CnvSource,
    pub cnv_subscription_channel: SubscriptionChannel,
    /// Base directory for failure diagnostic artifacts.
    pub collector_base_directory: PathBuf,
}

impl RunConfig {
    /// Build the configuration from the static layers plus command-line
    /// overrides. Computed values (server URL, credentials, default storage
    /// class) are resolved later in the session start sequence.
    pub fn resolve(opts: &RunOptions, arch: Arch) -> Result<Self, ConfigError> {
        let mut document: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str(DEFAULTS_YAML)?;
        if arch == Arch::S390x {
            let overlay: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(S390X_YAML)?;
            // Last writer wins per top-level key.
            document.extend(overlay);
        }

        let mut matrices = BTreeMap::new();
        for (key, value) in &document {
            if key.ends_with("_matrix") {
                matrices.insert(key.clone(), Matrix::from_yaml(value)?);
            }
        }

        let servers = document
            .get("servers")
            .and_then(|value| {
                serde_yaml::from_value::<BTreeMap<String, String>>(value.clone()).ok()
            })
            .unwrap_or_default();

        let collector_base_directory = opts
            .data_collector_output_dir
            .clone()
            .unwrap_or_else(|| {
                document
                    .get("data_collector")
                    .and_then(|value| value.get("data_collector_base_directory"))
                    .and_then(serde_yaml::Value::as_str)
                    .unwrap_or(DATA_COLLECTOR_BASE_DIRECTORY)
                    .into()
            });

        Ok(Self {
            matrices,
            system_matrices: BTreeMap::new(),
            default_storage_class: string_key(&document, "default_storage_class"),
            server_url: string_key(&document, "server_url"),
            servers,
            version_explorer_url: string_key(&document, "version_explorer_url"),
            os_login: None,
            upgraded_product: opts.upgraded_product(),
            cnv_source: opts.cnv_source,
            cnv_subscription_channel: opts.cnv_channel,
            collector_base_directory,
        })
    }

    pub fn matrix(&self, name: &str) -> Option<&Matrix> {
        self.matrices.get(name)
    }

    /// Pre-override snapshot of a matrix (`system_<name>`), captured before
    /// latest-OS narrowing and command-line overrides are applied.
    pub fn system_matrix(&self, name: &str) -> Option<&Matrix> {
        self.system_matrices.get(name)
    }

    /// Snapshot the matrices whose full lists some tests need even after
    /// runtime narrowing.
    pub fn snapshot_system_matrices(&mut self) {
        for name in ["storage_class_matrix", "windows_os_matrix", "rhel_os_matrix"] {
            if let Some(matrix) = self.matrices.get(name) {
                self.system_matrices
                    .insert(format!("system_{name}"), matrix.clone());
            }
        }
    }

    /// Narrow each OS family matrix to its latest entry when the matching
    /// `--latest-*` flag is set. RHEL narrowing also applies to the
    /// instance-type RHEL matrix.
    pub fn apply_latest_os(&mut self, opts: &RunOptions) {
        if opts.latest_rhel {
            self.narrow_to_latest("rhel_os_matrix");
            self.narrow_to_latest("instance_type_rhel_os_matrix");
        }
        if opts.latest_windows {
            self.narrow_to_latest("windows_os_matrix");
        }
        if opts.latest_fedora {
            self.narrow_to_latest("fedora_os_matrix");
        }
        if opts.latest_centos {
            self.narrow_to_latest("centos_os_matrix");
        }
    }

    fn narrow_to_latest(&mut self, name: &str) {
        if let Some(latest) = self.matrices.get(name).and_then(Matrix::latest_os) {
            self.matrices.insert(name.to_string(), latest);
        }
    }

    /// Apply explicit `--<matrix>=val1,val2` overrides by ordered
    /// intersection with the configured list.
    pub fn apply_matrix_overrides(
        &mut self,
        overrides: &[(&str, &[String])],
    ) -> Result<(), ConfigError> {
        for (key, requested) in overrides {
            let matrix = self
                .matrices
                .get(*key)
                .ok_or_else(|| ConfigError::UnknownMatrix {
                    key: (*key).to_string(),
                })?;
            let narrowed = matrix.intersect(requested);
            self.matrices.insert((*key).to_string(), narrowed);
        }
        Ok(())
    }

    /// Resolve the default storage class: an explicit request must exist in
    /// the storage class matrix; otherwise the entry flagged `default`, or
    /// the first entry, wins.
    pub fn resolve_default_storage_class(
        &mut self,
        requested: Option<&str>,
    ) -> Result<(), ConfigError> {
        let matrix = self
            .matrices
            .get("storage_class_matrix")
            .ok_or(ConfigError::EmptyStorageClassMatrix)?;
        if matrix.is_empty() {
            return Err(ConfigError::EmptyStorageClassMatrix);
        }

        let chosen = match requested {
            Some(name) => {
                if !matrix.values().iter().any(|value| value.id() == name) {
                    return Err(ConfigError::UnknownStorageClass {
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => matrix
                .values()
                .iter()
                .find(|value| value.flag("default"))
                .or_else(|| matrix.values().first())
                .map(|value| value.id().to_string())
                .ok_or(ConfigError::EmptyStorageClassMatrix)?,
        };

        self.default_storage_class = chosen;
        Ok(())
    }

    /// Record the resolved artifact-server URL and expand the per-protocol
    /// server URL templates.
    pub fn set_server_url(&mut self, url: &str) {
        self.server_url = url.to_string();
        for template in self.servers.values_mut() {
            *template = template.replace("{server}", url);
        }
    }

    /// Required keys must be non-empty once session start completes.
    pub fn ensure_required(&self) -> Result<(), ConfigError> {
        if self.default_storage_class.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "default_storage_class",
            });
        }
        if self.server_url.is_empty() {
            return Err(ConfigError::MissingRequired { key: "server_url" });
        }
        Ok(())
    }
}

fn string_key(document: &BTreeMap<String, serde_yaml::Value>, key: &str) -> String {
    document
        .get(key)
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default()
        .to_string()
}
