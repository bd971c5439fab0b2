//! Strongly-typed test item model.
//!
//! A [`TestItem`] is one discovered test case: name, file path, ordered
//! marker set, fixture names, and the user-visible properties exported for
//! external tracking systems. Items are created by the suite registry,
//! mutated only by the selection pipeline during collection, and handed
//! read-only to the runner afterwards.

/// Classification tags a test can carry.
///
/// Markers are a closed set rather than free-form strings; the tracking
/// markers carry their external id as payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    // Tier markers and the tags that exclude a test from tier2.
    Tier2,
    Tier3,
    Destructive,
    Chaos,
    Gpfs,
    Install,
    Benchmark,
    SapHana,
    Scale,
    Longevity,
    OvsBrcnv,
    NodeRemediation,
    Swap,
    Numa,

    // Team ownership markers.
    Virt,
    Network,
    Storage,
    InstallUpgradeOperators,
    Observability,
    Infrastructure,
    DataProtection,

    // Upgrade lane markers.
    Upgrade,
    UpgradeCustom,
    CnvUpgrade,
    OcpUpgrade,
    EusUpgrade,

    // Architecture and hardware markers.
    X86_64,
    Gpu,
    SpecialInfra,

    // Behavior markers.
    DeprecatedApi,
    SingleNodeTests,
    SkipMustGatherCollection,

    // External tracking markers.
    Polarion(String),
    Jira(String),
}

impl Marker {
    /// The marker's name as it appears in marker expressions and logs.
    pub fn name(&self) -> &str {
        match self {
            Marker::Tier2 => "tier2",
            Marker::Tier3 => "tier3",
            Marker::Destructive => "destructive",
            Marker::Chaos => "chaos",
            Marker::Gpfs => "gpfs",
            Marker::Install => "install",
            Marker::Benchmark => "benchmark",
            Marker::SapHana => "sap_hana",
            Marker::Scale => "scale",
            Marker::Longevity => "longevity",
            Marker::OvsBrcnv => "ovs_brcnv",
            Marker::NodeRemediation => "node_remediation",
            Marker::Swap => "swap",
            Marker::Numa => "numa",
            Marker::Virt => "virt",
            Marker::Network => "network",
            Marker::Storage => "storage",
            Marker::InstallUpgradeOperators => "install_upgrade_operators",
            Marker::Observability => "observability",
            Marker::Infrastructure => "infrastructure",
            Marker::DataProtection => "data_protection",
            Marker::Upgrade => "upgrade",
            Marker::UpgradeCustom => "upgrade_custom",
            Marker::CnvUpgrade => "cnv_upgrade",
            Marker::OcpUpgrade => "ocp_upgrade",
            Marker::EusUpgrade => "eus_upgrade",
            Marker::X86_64 => "x86_64",
            Marker::Gpu => "gpu",
            Marker::SpecialInfra => "special_infra",
            Marker::DeprecatedApi => "deprecated_api",
            Marker::SingleNodeTests => "single_node_tests",
            Marker::SkipMustGatherCollection => "skip_must_gather_collection",
            Marker::Polarion(_) => "polarion",
            Marker::Jira(_) => "jira",
        }
    }
}

/// One discovered test case.
#[derive(Debug, Clone)]
pub struct TestItem {
    name: String,
    path: String,
    markers: Vec<Marker>,
    fixtures: Vec<String>,
    user_properties: Vec<(String, String)>,
    skip_reason: Option<String>,
}

impl TestItem {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            markers: Vec::new(),
            fixtures: Vec::new(),
            user_properties: Vec::new(),
            skip_reason: None,
        }
    }

    pub fn with_markers(mut self, markers: impl IntoIterator<Item = Marker>) -> Self {
        for marker in markers {
            self.add_marker(marker);
        }
        self
    }

    pub fn with_fixtures(mut self, fixtures: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fixtures.extend(fixtures.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File path of the test, relative to the repository root
    /// (e.g. `tests/virt/node/test_machine_type.rs`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fully-qualified name used to key diagnostic records.
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.path, self.name)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn fixtures(&self) -> &[String] {
        &self.fixtures
    }

    pub fn user_properties(&self) -> &[(String, String)] {
        &self.user_properties
    }

    /// Add a marker unless an identical one is already present.
    pub fn add_marker(&mut self, marker: Marker) {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
    }

    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.markers.contains(marker)
    }

    /// Check for a marker by name, ignoring any payload.
    pub fn has_marker_named(&self, name: &str) -> bool {
        self.markers.iter().any(|m| m.name() == name)
    }

    pub fn push_user_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.user_properties.push((key.into(), value.into()));
    }

    /// Rewrite the item name after matrix parameter expansion.
    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.skip_reason = Some(reason.into());
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Second path segment, used for team ownership lookup
    /// (`tests/<team>/...`).
    pub fn team_path_segment(&self) -> Option<&str> {
        self.path.split('/').nth(1)
    }
}
