//! Network-area suite: mac pool management and secondary networks.

use std::time::Duration;

use common::constants::namespaces;
use harness::item::{Marker, TestItem};
use harness::runner::TestCase;
use harness::wait::wait_for_condition;

use super::ensure;

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new(
            TestItem::new(
                "test_kubemacpool_manager_running",
                "tests/network/kubemacpool/test_kubemacpool.rs",
            )
            .with_markers([Marker::Polarion("CNV-3418".to_string())]),
            |ctx| async move {
                let cluster = ctx.cluster.clone();
                wait_for_condition(
                    "kubemacpool manager pods running",
                    Duration::from_secs(5),
                    Duration::from_secs(120),
                    move || {
                        let cluster = cluster.clone();
                        async move {
                            cluster
                                .oc(&[
                                    "get",
                                    "pods",
                                    "-n",
                                    namespaces::OPENSHIFT_CNV,
                                    "-l",
                                    "app=kubemacpool",
                                    "-o",
                                    "jsonpath={.items[*].status.phase}",
                                ])
                                .await
                                .map(|output| {
                                    let phases: Vec<&str> =
                                        output.stdout.split_whitespace().collect();
                                    !phases.is_empty()
                                        && phases.iter().all(|phase| *phase == "Running")
                                })
                                .unwrap_or(false)
                        }
                    },
                )
                .await?;
                Ok(())
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_bridge_attachment_definitions",
                "tests/network/bridges/test_bridge_devices.rs",
            )
            .with_markers([Marker::Polarion("CNV-5261".to_string())])
            .with_fixtures(["bridge_device_matrix__class__"]),
            |ctx| async move {
                let Some(matrix) = ctx.config.matrix("bridge_device_matrix") else {
                    return Err(common::error::TestError::Assertion(
                        "bridge_device_matrix is not configured".to_string(),
                    ));
                };
                ensure(!matrix.is_empty(), "bridge device matrix is empty")?;
                // The NAD CRD must be served before any bridge test can run.
                ctx.cluster
                    .oc(&["get", "network-attachment-definitions", "-A", "-o", "name"])
                    .await?;
                Ok(())
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_nmstate_handler_ready",
                "tests/network/nmstate/test_nmstate.rs",
            )
            .with_markers([Marker::Polarion("CNV-6109".to_string())]),
            |ctx| async move {
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "pods",
                        "-n",
                        namespaces::OPENSHIFT_NMSTATE,
                        "-o",
                        "jsonpath={.items[*].status.phase}",
                    ])
                    .await?;
                ensure(
                    output
                        .stdout
                        .split_whitespace()
                        .all(|phase| phase == "Running" || phase == "Succeeded"),
                    "nmstate pods not all running",
                )
            },
        ),
    ]
}
