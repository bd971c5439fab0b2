//! Single-node topology suite.
//!
//! These cases only run when the marker expression mentions `sno`.

use harness::item::{Marker, TestItem};
use harness::runner::TestCase;

use super::ensure;

pub fn cases() -> Vec<TestCase> {
    vec![TestCase::new(
        TestItem::new(
            "test_single_node_topology",
            "tests/virt/single_node/test_single_node.rs",
        )
        .with_markers([
            Marker::SingleNodeTests,
            Marker::Polarion("CNV-7718".to_string()),
        ]),
        |ctx| async move {
            let nodes = ctx.cluster.oc_json(&["get", "nodes"]).await?;
            let node_count = nodes["items"].as_array().map_or(0, Vec::len);
            ensure(
                node_count == 1,
                format!("expected a single-node cluster, found {node_count} nodes"),
            )
        },
    )]
}
