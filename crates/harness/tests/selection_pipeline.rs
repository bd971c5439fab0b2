//! End-to-end selection pipeline tests: annotation and filtering across the
//! full pass sequence, driven through the public `collect` entry point.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use clap::Parser;
use harness::config::{Arch, RunConfig};
use harness::item::{Marker, TestItem};
use harness::matrix::ConfigMatrixSource;
use harness::options::RunOptions;
use harness::runner::TestCase;
use harness::selection::{collect, DeselectionLog};

fn options(args: &[&str]) -> RunOptions {
    RunOptions::try_parse_from(std::iter::once("virt-tests").chain(args.iter().copied()))
        .expect("options should parse")
}

fn config(args: &[&str]) -> RunConfig {
    RunConfig::resolve(&options(args), Arch::X86_64).expect("config should resolve")
}

fn case(name: &str, path: &str, markers: &[Marker]) -> TestCase {
    TestCase::new(
        TestItem::new(name, path).with_markers(markers.iter().cloned()),
        |_ctx| async { Ok(()) },
    )
}

#[test]
fn full_pipeline_annotates_every_kept_item() {
    let opts = options(&[]);
    let config = config(&[]);
    let mut sink = DeselectionLog::default();

    let cases = vec![
        case("test_plain", "tests/virt/test_plain.rs", &[]),
        case(
            "test_destructive",
            "tests/virt/test_destructive.rs",
            &[Marker::Destructive],
        ),
    ];
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();
    assert_eq!(kept.len(), 2);

    let plain = kept
        .iter()
        .find(|case| case.item.name() == "test_plain")
        .unwrap();
    assert!(plain.item.has_marker(&Marker::Tier2));
    assert!(plain.item.has_marker(&Marker::Virt));
    assert!(plain.item.has_marker(&Marker::X86_64));

    let destructive = kept
        .iter()
        .find(|case| case.item.name() == "test_destructive")
        .unwrap();
    assert!(!destructive.item.has_marker(&Marker::Tier2));
    assert!(destructive.item.has_marker(&Marker::X86_64));
}

#[test]
fn default_run_discards_upgrade_cases_and_keeps_the_rest() {
    let opts = options(&[]);
    let config = config(&[]);
    let mut sink = DeselectionLog::default();

    let cases = vec![
        case("test_plain", "tests/virt/test_plain.rs", &[]),
        case(
            "test_cnv_upgrade_process_production_source",
            "tests/install_upgrade_operators/test_upgrade.rs",
            &[Marker::Upgrade, Marker::CnvUpgrade],
        ),
        case(
            "test_deprecation_audit_logs",
            "tests/deprecated_api/test_audit.rs",
            &[Marker::DeprecatedApi],
        ),
        case(
            "test_single_node_topology",
            "tests/virt/single_node/test_sno.rs",
            &[Marker::SingleNodeTests],
        ),
    ];
    let total = cases.len();
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();

    let kept_names: Vec<&str> = kept.iter().map(|case| case.item.name()).collect();
    assert!(kept_names.contains(&"test_plain"));
    // Deprecated-API audits run by default; single-node cases survive when
    // no marker expression is given; upgrade cases are deselected.
    assert!(kept_names.contains(&"test_deprecation_audit_logs"));
    assert!(kept_names.contains(&"test_single_node_topology"));
    assert!(!kept_names.contains(&"test_cnv_upgrade_process_production_source"));

    // No loss: kept plus deselected covers the whole collection.
    assert_eq!(kept.len() + sink.count, total);
}

#[test]
fn cnv_production_lane_keeps_exactly_the_production_variant() {
    let args = [
        "--upgrade",
        "cnv",
        "--cnv-version",
        "4.17.0",
        "--cnv-source",
        "production",
    ];
    let opts = options(&args);
    let config = config(&args);
    let mut sink = DeselectionLog::default();

    let cases = vec![
        case(
            "test_cnv_upgrade_process_production_source",
            "tests/install_upgrade_operators/test_upgrade.rs",
            &[Marker::Upgrade, Marker::CnvUpgrade],
        ),
        case(
            "test_cnv_upgrade_process_osbs_source",
            "tests/install_upgrade_operators/test_upgrade.rs",
            &[Marker::Upgrade, Marker::CnvUpgrade],
        ),
        case("test_plain", "tests/virt/test_plain.rs", &[]),
        case(
            "test_deprecation_audit_logs",
            "tests/deprecated_api/test_audit.rs",
            &[Marker::DeprecatedApi],
        ),
    ];
    let total = cases.len();
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();

    assert_eq!(kept.len(), 1);
    assert_eq!(
        kept[0].item.name(),
        "test_cnv_upgrade_process_production_source"
    );
    assert_eq!(kept.len() + sink.count, total);
}

#[test]
fn cnv_staged_lane_keeps_exactly_the_osbs_variant() {
    let args = [
        "--upgrade",
        "cnv",
        "--cnv-version",
        "4.17.0",
        "--cnv-image",
        "quay.io/cnv-index:4.17",
    ];
    let opts = options(&args);
    let config = config(&args);
    let mut sink = DeselectionLog::default();

    let cases = vec![
        case(
            "test_cnv_upgrade_process_production_source",
            "tests/install_upgrade_operators/test_upgrade.rs",
            &[Marker::Upgrade, Marker::CnvUpgrade],
        ),
        case(
            "test_cnv_upgrade_process_osbs_source",
            "tests/install_upgrade_operators/test_upgrade.rs",
            &[Marker::Upgrade, Marker::CnvUpgrade],
        ),
    ];
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].item.name(), "test_cnv_upgrade_process_osbs_source");
}

#[test]
fn marker_expression_without_sno_deselects_single_node_cases() {
    let opts = options(&["-m", "tier2"]);
    let config = config(&[]);
    let mut sink = DeselectionLog::default();

    let cases = vec![
        case("test_plain", "tests/virt/test_plain.rs", &[]),
        case(
            "test_single_node_topology",
            "tests/virt/single_node/test_sno.rs",
            &[Marker::SingleNodeTests],
        ),
    ];
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].item.name(), "test_plain");
    assert_eq!(sink.count, 1);
}

#[test]
fn dynamic_matrix_resolving_empty_marks_the_case_skipped() {
    let opts = options(&[]);
    let config = config(&[]);
    let mut sink = DeselectionLog::default();

    let cases = vec![TestCase::new(
        TestItem::new("test_encrypted_dv", "tests/storage/test_encrypted_dv.rs")
            .with_fixtures(["storage_class_matrix_encrypted_matrix__module__"]),
        |_ctx| async { Ok(()) },
    )];
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();

    assert_eq!(kept.len(), 1);
    let reason = kept[0].item.skip_reason().unwrap();
    assert!(reason.contains("storage_class_matrix_encrypted_matrix"));
}

#[test]
fn matrix_expansion_flows_into_tracking_properties() {
    let opts = options(&[]);
    let config = config(&[]);
    let mut sink = DeselectionLog::default();

    let cases = vec![TestCase::new(
        TestItem::new("test_vm_volumes", "tests/storage/test_volumes.rs")
            .with_fixtures(["vm_volumes_matrix__module__"])
            .with_markers([Marker::Polarion("CNV-1234".to_string())]),
        |_ctx| async { Ok(()) },
    )];
    let kept = collect(cases, &opts, &config, &ConfigMatrixSource, &mut sink).unwrap();
    assert_eq!(kept.len(), 2);

    let first = &kept[0].item;
    assert_eq!(first.name(), "test_vm_volumes[#container_disk#]");
    assert!(first.user_properties().contains(&(
        "polarion-parameter-vm_volumes_matrix".to_string(),
        "container_disk".to_string()
    )));
    assert!(first
        .user_properties()
        .contains(&("polarion-testcase-id".to_string(), "CNV-1234".to_string())));
}
