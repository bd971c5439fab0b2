//! Test selection pipeline.
//!
//! Transforms the full set of registered test cases into the subset that
//! should execute, annotated with consistent metadata. Passes run in a fixed
//! order: matrix parameter expansion, tracking-id propagation, tier marker,
//! team marker, architecture marker, then the upgrade-lane, deprecated-API,
//! and single-node filters. Every filtering pass reports its discarded cases
//! to the deselection sink so collected counts stay consistent with what
//! actually runs.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use crate::config::RunConfig;
use crate::item::{Marker, TestItem};
use crate::matrix::{base_matrix_name, split_scope, Matrix, MatrixError, MatrixSource};
use crate::options::{CnvSource, RunOptions, UpgradedProduct};
use crate::runner::TestCase;

#[allow(clippy::expect_used)]
static PARAM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(#.*?#)").expect("static regex is valid"));

/// Markers excluding a test from the default tier2 classification.
const TIER2_EXCLUDED: [Marker; 13] = [
    Marker::Destructive,
    Marker::Chaos,
    Marker::Gpfs,
    Marker::Tier3,
    Marker::Install,
    Marker::Benchmark,
    Marker::SapHana,
    Marker::Scale,
    Marker::Longevity,
    Marker::OvsBrcnv,
    Marker::NodeRemediation,
    Marker::Swap,
    Marker::Numa,
];

/// Team ownership table: team marker against the path segments it owns.
const TEAM_MARKERS: [(Marker, [&str; 2]); 8] = [
    (Marker::Chaos, ["chaos", "deprecated_api"]),
    (Marker::Virt, ["virt", "deprecated_api"]),
    (Marker::Network, ["network", "deprecated_api"]),
    (Marker::Storage, ["storage", "deprecated_api"]),
    (
        Marker::InstallUpgradeOperators,
        ["install_upgrade_operators", "deprecated_api"],
    ),
    (Marker::Observability, ["observability", "deprecated_api"]),
    (Marker::Infrastructure, ["infrastructure", "deprecated_api"]),
    (Marker::DataProtection, ["data_protection", "deprecated_api"]),
];

/// Collection-time errors. All fatal; the run aborts before executing.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Receives the cases each filtering pass discards.
pub trait DeselectionSink {
    fn deselected(&mut self, cases: &[TestCase]);
}

/// Default sink: counts discards and logs each discarded case.
#[derive(Debug, Default)]
pub struct DeselectionLog {
    pub count: usize,
}

impl DeselectionSink for DeselectionLog {
    fn deselected(&mut self, cases: &[TestCase]) {
        self.count += cases.len();
        for case in cases {
            debug!(test = %case.item.full_name(), "deselected");
        }
    }
}

/// Run the full selection pipeline over the registered cases.
pub fn collect(
    cases: Vec<TestCase>,
    opts: &RunOptions,
    config: &RunConfig,
    source: &dyn MatrixSource,
    sink: &mut dyn DeselectionSink,
) -> Result<Vec<TestCase>, SelectionError> {
    // Expansion must precede every filtering pass; later passes operate per
    // expanded item.
    let mut cases = expand_matrix_parameters(cases, config, source)?;

    for case in &mut cases {
        propagate_tracking_ids(&mut case.item, config);
        add_tier2_marker(&mut case.item);
        mark_by_team(&mut case.item);
        // Every test is verified on x86_64 platforms.
        case.item.add_marker(Marker::X86_64);
    }

    let (keep, discard) = filter_upgrade_cases(cases, opts, config);
    if !discard.is_empty() {
        sink.deselected(&discard);
    }
    let keep = filter_deprecated_api_cases(keep, opts, sink);
    let keep = filter_single_node_cases(keep, opts, sink);
    Ok(keep)
}

/// Expand each case across the parameters of every matrix fixture it uses.
///
/// Dynamic matrices that resolve to an empty parameter list mark the case
/// skipped with a reason citing the matrix; a matrix fixture without a scope
/// suffix aborts collection.
fn expand_matrix_parameters(
    cases: Vec<TestCase>,
    config: &RunConfig,
    source: &dyn MatrixSource,
) -> Result<Vec<TestCase>, SelectionError> {
    let mut expanded = Vec::new();

    for case in cases {
        let matrix_fixtures: Vec<String> = case
            .item
            .fixtures()
            .iter()
            .filter(|fixture| fixture.contains("_matrix"))
            .cloned()
            .collect();

        let mut variants: Vec<(TestCase, Vec<String>)> = vec![(case, Vec::new())];

        for fixture in &matrix_fixtures {
            let (matrix_name, _scope) = split_scope(fixture)?;
            let base = base_matrix_name(matrix_name);
            let params = source.matrix_params(config, matrix_name);

            if matrix_name != base && params.as_ref().map_or(true, Matrix::is_empty) {
                for (variant, _) in &mut variants {
                    variant.item.mark_skipped(format!(
                        "Dynamic matrix {matrix_name} returned empty list"
                    ));
                }
                continue;
            }

            if let Some(params) = params {
                if !params.is_empty() {
                    variants = expand_variants(variants, &params);
                }
            }
        }

        for (mut variant, ids) in variants {
            if !ids.is_empty() {
                let name = format!("{}[{}]", variant.item.name(), ids.join("-"));
                variant.item.set_name(name);
            }
            expanded.push(variant);
        }
    }

    Ok(expanded)
}

fn expand_variants(
    variants: Vec<(TestCase, Vec<String>)>,
    params: &Matrix,
) -> Vec<(TestCase, Vec<String>)> {
    let mut next = Vec::with_capacity(variants.len() * params.len());
    for (case, ids) in variants {
        for value in params.values() {
            let mut ids = ids.clone();
            ids.push(format!("#{}#", value.id()));
            next.push((case.clone(), ids));
        }
    }
    next
}

/// Copy matrix parameters and tracking-id markers into the item's exported
/// properties so external reporting can associate results with tracking
/// records.
fn propagate_tracking_ids(item: &mut TestItem, config: &RunConfig) {
    let matrix_fixtures: Vec<String> = item
        .fixtures()
        .iter()
        .filter(|fixture| fixture.contains("_matrix"))
        .cloned()
        .collect();

    for fixture in &matrix_fixtures {
        let Ok((matrix_name, _scope)) = split_scope(fixture) else {
            continue;
        };
        let base = base_matrix_name(matrix_name).to_string();
        let Some(matrix) = config.matrix(&base) else {
            continue;
        };

        let generated_values: Vec<String> = PARAM_ID_PATTERN
            .find_iter(item.name())
            .map(|found| found.as_str().trim_matches('#').to_string())
            .collect();
        let matched: Vec<String> = generated_values
            .iter()
            .filter(|value| matrix.values().iter().any(|param| param.id() == value.as_str()))
            .cloned()
            .collect();
        for value in matched {
            item.push_user_property(format!("polarion-parameter-{base}"), value);
        }
    }

    let tracking_ids: Vec<(String, String)> = item
        .markers()
        .iter()
        .filter_map(|marker| match marker {
            Marker::Polarion(id) => Some(("polarion-testcase-id".to_string(), id.clone())),
            Marker::Jira(id) => Some(("jira".to_string(), id.clone())),
            _ => None,
        })
        .collect();
    for (key, id) in tracking_ids {
        item.push_user_property(key, id);
    }
}

/// Additive pass: every item without a tier-exclusion marker becomes tier2.
fn add_tier2_marker(item: &mut TestItem) {
    if !TIER2_EXCLUDED.iter().any(|marker| item.has_marker(marker)) {
        item.add_marker(Marker::Tier2);
    }
}

/// Attach team ownership markers from the item's path.
fn mark_by_team(item: &mut TestItem) {
    let Some(segment) = item.team_path_segment().map(str::to_string) else {
        return;
    };
    for (team, segments) in &TEAM_MARKERS {
        if segments.contains(&segment.as_str()) {
            item.add_marker(team.clone());
        }
    }
}

/// Partition into upgrade and non-upgrade cases, then keep the set the run
/// configuration asks for.
///
/// With a lane selected only the matching upgrade cases survive; without
/// one, all upgrade cases are discarded and everything else runs.
fn filter_upgrade_cases(
    cases: Vec<TestCase>,
    opts: &RunOptions,
    config: &RunConfig,
) -> (Vec<TestCase>, Vec<TestCase>) {
    let chosen_upgrade = opts.upgrade.is_some();
    let chosen_custom = opts.upgrade_custom.is_some();
    let lane_selected = chosen_upgrade || chosen_custom;

    let mut upgrade_cases = Vec::new();
    let mut non_upgrade_cases = Vec::new();
    for case in cases {
        let collected = if lane_selected {
            (chosen_upgrade && case.item.has_marker(&Marker::Upgrade))
                || (chosen_custom && case.item.has_marker(&Marker::UpgradeCustom))
        } else {
            case.item.has_marker(&Marker::Upgrade) || case.item.has_marker(&Marker::UpgradeCustom)
        };
        if collected {
            upgrade_cases.push(case);
        } else {
            non_upgrade_cases.push(case);
        }
    }

    if lane_selected {
        let (keep, mut discard) = select_upgrade_lane_cases(upgrade_cases, config);
        let mut discarded = non_upgrade_cases;
        discarded.append(&mut discard);
        (keep, discarded)
    } else {
        (non_upgrade_cases, upgrade_cases)
    }
}

/// Keep only the upgrade cases for the configured lane; for the CNV lane the
/// upgrade-process test additionally disambiguates between the
/// production-source and staged-source variants by exact name matching.
fn select_upgrade_lane_cases(
    upgrade_cases: Vec<TestCase>,
    config: &RunConfig,
) -> (Vec<TestCase>, Vec<TestCase>) {
    let marker_name = config.upgraded_product.upgrade_marker_name();
    let mut keep = Vec::new();
    let mut discard = Vec::new();

    for case in upgrade_cases {
        let name = case.item.name().to_string();
        if config.upgraded_product == UpgradedProduct::Cnv && name.contains("cnv_upgrade_process") {
            // The production upgrade-process test runs for the production
            // source; the staged/osbs variant runs for everything else.
            let production_source = config.cnv_source == CnvSource::Production;
            if production_source == name.contains("production_source") {
                keep.push(case);
            } else {
                discard.push(case);
            }
        } else if case.item.has_marker_named(marker_name) {
            keep.push(case);
        } else {
            discard.push(case);
        }
    }

    (keep, discard)
}

/// Remove deprecated-API cases when explicitly asked, or when running
/// install or upgrade lanes.
fn filter_deprecated_api_cases(
    cases: Vec<TestCase>,
    opts: &RunOptions,
    sink: &mut dyn DeselectionSink,
) -> Vec<TestCase> {
    if opts.skip_deprecated_api_test
        || opts.install
        || opts.upgrade.is_some()
        || opts.upgrade_custom.is_some()
    {
        let (discard, keep) = remove_cases_with_marker(cases, &Marker::DeprecatedApi);
        if !discard.is_empty() {
            sink.deselected(&discard);
        }
        return keep;
    }
    cases
}

/// Remove single-node cases unless the marker expression mentions `sno`.
fn filter_single_node_cases(
    cases: Vec<TestCase>,
    opts: &RunOptions,
    sink: &mut dyn DeselectionSink,
) -> Vec<TestCase> {
    if let Some(expression) = opts.markers.as_deref() {
        if !expression.contains("sno") {
            let (discard, keep) = remove_cases_with_marker(cases, &Marker::SingleNodeTests);
            if !discard.is_empty() {
                sink.deselected(&discard);
            }
            return keep;
        }
    }
    cases
}

fn remove_cases_with_marker(
    cases: Vec<TestCase>,
    marker: &Marker,
) -> (Vec<TestCase>, Vec<TestCase>) {
    let mut discard = Vec::new();
    let mut keep = Vec::new();
    for case in cases {
        if case.item.has_marker(marker) {
            discard.push(case);
        } else {
            keep.push(case);
        }
    }
    (discard, keep)
}
