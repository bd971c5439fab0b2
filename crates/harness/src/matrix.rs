//! Matrix parameter sets.
//!
//! A matrix is a named, ordered list of parameter values used to run the
//! same test logic across input variants (OS images, storage classes, run
//! strategies). Values are either plain scalars or single-key mappings whose
//! key identifies the variant and whose payload carries its settings.
//!
//! Test fixtures reference matrices as `<matrix_name>__<scope>__`; the scope
//! suffix is one of `module`, `class`, or `function`. Dynamic matrices are
//! derived from a base matrix by a qualifier (for example
//! `storage_class_matrix_snapshot_matrix`) and resolve through a
//! [`MatrixSource`] at collection time.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::config::RunConfig;

#[allow(clippy::expect_used)]
static SCOPE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__(module|class|function)__$").expect("static regex is valid")
});

#[allow(clippy::expect_used)]
static BASE_MATRIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*?_matrix)").expect("static regex is valid"));

/// Matrix model errors.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("{fixture} is missing scope (__<scope>__)")]
    MissingScope { fixture: String },

    #[error("Matrix value mapping must have exactly one key, found {found}")]
    NotSingleKey { found: usize },

    #[error("Invalid matrix document: {0}")]
    InvalidDocument(String),
}

/// Parametrization scope of a matrix fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixScope {
    Module,
    Class,
    Function,
}

/// Strip the scope suffix from a matrix fixture name.
///
/// A matrix fixture without a recognized scope suffix is a configuration
/// error; collection aborts on it.
pub fn split_scope(fixture_name: &str) -> Result<(&str, MatrixScope), MatrixError> {
    let captures = SCOPE_SUFFIX
        .captures(fixture_name)
        .ok_or_else(|| MatrixError::MissingScope {
            fixture: fixture_name.to_string(),
        })?;
    let scope = match &captures[1] {
        "module" => MatrixScope::Module,
        "class" => MatrixScope::Class,
        _ => MatrixScope::Function,
    };
    Ok((&fixture_name[..fixture_name.len() - captures[0].len()], scope))
}

/// Canonicalize a dynamic matrix name to its base matrix name.
///
/// `storage_class_matrix_snapshot_matrix` canonicalizes to
/// `storage_class_matrix`; a plain matrix name is returned unchanged.
pub fn base_matrix_name(matrix_name: &str) -> &str {
    match BASE_MATRIX.captures(matrix_name) {
        Some(captures) => match captures.name("base") {
            Some(base) => &matrix_name[..base.end()],
            None => matrix_name,
        },
        None => matrix_name,
    }
}

/// One matrix parameter: a scalar or a single-key mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixValue {
    Scalar(String),
    Keyed {
        key: String,
        settings: BTreeMap<String, serde_yaml::Value>,
    },
}

impl MatrixValue {
    /// The generated-test-id token for this value: the scalar itself, or the
    /// mapping's single key.
    pub fn id(&self) -> &str {
        match self {
            MatrixValue::Scalar(value) => value,
            MatrixValue::Keyed { key, .. } => key,
        }
    }

    /// Look up a boolean settings flag; scalars carry no settings.
    pub fn flag(&self, name: &str) -> bool {
        match self {
            MatrixValue::Scalar(_) => false,
            MatrixValue::Keyed { settings, .. } => settings
                .get(name)
                .and_then(serde_yaml::Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn from_yaml(value: &serde_yaml::Value) -> Result<Self, MatrixError> {
        match value {
            serde_yaml::Value::String(scalar) => Ok(MatrixValue::Scalar(scalar.clone())),
            serde_yaml::Value::Mapping(mapping) => {
                if mapping.len() != 1 {
                    return Err(MatrixError::NotSingleKey {
                        found: mapping.len(),
                    });
                }
                let (key, settings) = match mapping.iter().next() {
                    Some(entry) => entry,
                    None => return Err(MatrixError::NotSingleKey { found: 0 }),
                };
                let key = key
                    .as_str()
                    .ok_or_else(|| {
                        MatrixError::InvalidDocument("matrix mapping key must be a string".into())
                    })?
                    .to_string();
                let settings = match settings {
                    serde_yaml::Value::Mapping(inner) => inner
                        .iter()
                        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                        .collect(),
                    serde_yaml::Value::Null => BTreeMap::new(),
                    other => {
                        return Err(MatrixError::InvalidDocument(format!(
                            "matrix settings for {key} must be a mapping, got {other:?}"
                        )))
                    }
                };
                Ok(MatrixValue::Keyed { key, settings })
            }
            other => Err(MatrixError::InvalidDocument(format!(
                "matrix value must be a string or single-key mapping, got {other:?}"
            ))),
        }
    }
}

/// A named, ordered parameter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    values: Vec<MatrixValue>,
}

impl Matrix {
    pub fn new(values: Vec<MatrixValue>) -> Self {
        Self { values }
    }

    /// Parse a matrix from its YAML list representation.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, MatrixError> {
        let list = value.as_sequence().ok_or_else(|| {
            MatrixError::InvalidDocument("matrix document must be a list".into())
        })?;
        let values = list
            .iter()
            .map(MatrixValue::from_yaml)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    pub fn values(&self) -> &[MatrixValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Narrow to the values whose id is in `requested`, preserving the
    /// matrix's original relative order.
    pub fn intersect(&self, requested: &[String]) -> Matrix {
        Matrix {
            values: self
                .values
                .iter()
                .filter(|value| requested.iter().any(|id| id == value.id()))
                .cloned()
                .collect(),
        }
    }

    /// Keep only the values with a truthy `flag` setting, preserving order.
    pub fn filter_by_flag(&self, flag: &str) -> Matrix {
        Matrix {
            values: self
                .values
                .iter()
                .filter(|value| value.flag(flag))
                .cloned()
                .collect(),
        }
    }

    /// Pick the single latest-OS entry by numeric-aware comparison of each
    /// value id (`rhel-9-5` beats `rhel-8-10`).
    pub fn latest_os(&self) -> Option<Matrix> {
        self.values
            .iter()
            .max_by_key(|value| os_version_key(value.id()))
            .map(|value| Matrix {
                values: vec![value.clone()],
            })
    }
}

/// Extract the numeric components of an OS id for ordered comparison.
fn os_version_key(id: &str) -> Vec<u64> {
    id.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Resolver for matrix parameter lists referenced by test fixtures.
///
/// Static matrices resolve straight from the run configuration; dynamic
/// matrices (`<base>_<qualifier>_matrix`) are derived from the base matrix
/// at collection time and may legitimately resolve to an empty list.
pub trait MatrixSource {
    fn matrix_params(&self, config: &RunConfig, matrix_name: &str) -> Option<Matrix>;
}

/// Default resolver: config lookup for static names; dynamic names filter
/// the base matrix by the qualifier as a boolean settings flag
/// (`storage_class_matrix_snapshot_matrix` keeps storage classes with
/// `snapshot: true`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigMatrixSource;

impl MatrixSource for ConfigMatrixSource {
    fn matrix_params(&self, config: &RunConfig, matrix_name: &str) -> Option<Matrix> {
        let base = base_matrix_name(matrix_name);
        let base_matrix = config.matrix(base)?;
        if base == matrix_name {
            return Some(base_matrix.clone());
        }
        let qualifier = matrix_name[base.len()..]
            .trim_start_matches('_')
            .trim_end_matches("_matrix");
        Some(base_matrix.filter_by_flag(qualifier))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn yaml(doc: &str) -> serde_yaml::Value {
        serde_yaml::from_str(doc).unwrap()
    }

    #[test]
    fn test_split_scope() {
        let (name, scope) = split_scope("storage_class_matrix__module__").unwrap();
        assert_eq!(name, "storage_class_matrix");
        assert_eq!(scope, MatrixScope::Module);

        let (name, scope) = split_scope("rhel_os_matrix__class__").unwrap();
        assert_eq!(name, "rhel_os_matrix");
        assert_eq!(scope, MatrixScope::Class);

        let (name, scope) = split_scope("run_strategy_matrix__function__").unwrap();
        assert_eq!(name, "run_strategy_matrix");
        assert_eq!(scope, MatrixScope::Function);
    }

    #[test]
    fn test_split_scope_missing_suffix_is_an_error() {
        let err = split_scope("storage_class_matrix").unwrap_err();
        assert!(matches!(err, MatrixError::MissingScope { .. }));
        assert!(err.to_string().contains("missing scope"));
    }

    #[test]
    fn test_base_matrix_name() {
        assert_eq!(
            base_matrix_name("storage_class_matrix_snapshot_matrix"),
            "storage_class_matrix"
        );
        assert_eq!(base_matrix_name("storage_class_matrix"), "storage_class_matrix");
        assert_eq!(base_matrix_name("rhel_os_matrix"), "rhel_os_matrix");
    }

    #[test]
    fn test_matrix_value_ids() {
        let matrix = Matrix::from_yaml(&yaml(
            "- nfs\n- ceph:\n    snapshot: true\n",
        ))
        .unwrap();
        let ids: Vec<&str> = matrix.values().iter().map(MatrixValue::id).collect();
        assert_eq!(ids, ["nfs", "ceph"]);
    }

    #[test]
    fn test_multi_key_mapping_rejected() {
        let err = Matrix::from_yaml(&yaml("- a: {}\n  b: {}\n")).unwrap_err();
        assert!(matches!(err, MatrixError::NotSingleKey { found: 2 }));
    }

    #[test]
    fn test_intersect_preserves_original_order() {
        let matrix = Matrix::from_yaml(&yaml("- nfs\n- ceph\n- hostpath\n")).unwrap();
        let narrowed = matrix.intersect(&["ceph".to_string(), "nfs".to_string()]);
        let ids: Vec<&str> = narrowed.values().iter().map(MatrixValue::id).collect();
        // Original relative order, not the requested order.
        assert_eq!(ids, ["nfs", "ceph"]);
    }

    #[test]
    fn test_intersect_drops_unrequested() {
        let matrix = Matrix::from_yaml(&yaml("- nfs\n- ceph\n- hostpath\n")).unwrap();
        let narrowed = matrix.intersect(&["nfs".to_string(), "ceph".to_string()]);
        assert_eq!(narrowed.len(), 2);
        assert!(!narrowed.values().iter().any(|v| v.id() == "hostpath"));
    }

    #[test]
    fn test_latest_os_picks_highest_version() {
        let matrix = Matrix::from_yaml(&yaml(
            "- rhel-8-10:\n    image: rhel-810.qcow2\n- rhel-9-4:\n    image: rhel-94.qcow2\n- rhel-9-5:\n    image: rhel-95.qcow2\n",
        ))
        .unwrap();
        let latest = matrix.latest_os().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest.values()[0].id(), "rhel-9-5");
    }

    #[test]
    fn test_latest_os_empty_matrix() {
        assert!(Matrix::default().latest_os().is_none());
    }

    #[test]
    fn test_filter_by_flag() {
        let matrix = Matrix::from_yaml(&yaml(
            "- ceph:\n    snapshot: true\n- nfs:\n    snapshot: false\n- hostpath\n",
        ))
        .unwrap();
        let filtered = matrix.filter_by_flag("snapshot");
        let ids: Vec<&str> = filtered.values().iter().map(MatrixValue::id).collect();
        assert_eq!(ids, ["ceph"]);
    }

    #[test]
    fn test_os_version_key_ordering() {
        assert!(os_version_key("rhel-9-5") > os_version_key("rhel-8-10"));
        assert!(os_version_key("win-2022") > os_version_key("win-2019"));
        assert!(os_version_key("win-11") < os_version_key("win-2016"));
    }
}
