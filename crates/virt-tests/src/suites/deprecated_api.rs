//! Deprecated-API audit suite.
//!
//! These audits always run regardless of which paths were selected, unless
//! the run skips them explicitly or executes an install/upgrade lane.

use harness::item::{Marker, TestItem};
use harness::runner::TestCase;

use super::ensure;

pub fn cases() -> Vec<TestCase> {
    vec![TestCase::new(
        TestItem::new(
            "test_deprecation_audit_logs",
            "tests/deprecated_api/test_deprecation_audit_logs.rs",
        )
        .with_markers([
            Marker::DeprecatedApi,
            Marker::Polarion("CNV-9052".to_string()),
        ]),
        |ctx| async move {
            let output = ctx
                .cluster
                .oc(&[
                    "get",
                    "apirequestcounts",
                    "-o",
                    "jsonpath={range .items[?(@.status.removedInRelease)]}{.metadata.name}{\"\\n\"}{end}",
                ])
                .await?;
            let deprecated: Vec<&str> = output
                .stdout
                .lines()
                .filter(|line| line.contains("kubevirt.io"))
                .collect();
            ensure(
                deprecated.is_empty(),
                format!("deprecated kubevirt APIs still served: {deprecated:?}"),
            )
        },
    )]
}
