//! Upgrade lanes: CNV, OCP, and EUS upgrade flows.
//!
//! Only one lane executes per run; selection keeps the cases matching the
//! configured lane and, for CNV, the source variant matching the configured
//! index-image source.

use std::time::Duration;

use common::constants::namespaces;
use harness::item::{Marker, TestItem};
use harness::runner::TestCase;
use harness::wait::wait_for_condition;

use super::ensure;

async fn hyperconverged_ready(
    ctx: &harness::runner::RunContext,
) -> Result<(), common::error::TestError> {
    let cluster = ctx.cluster.clone();
    wait_for_condition(
        "hyperconverged operator available",
        Duration::from_secs(10),
        Duration::from_secs(600),
        move || {
            let cluster = cluster.clone();
            async move {
                cluster
                    .oc(&[
                        "get",
                        "hyperconverged",
                        "-n",
                        namespaces::OPENSHIFT_CNV,
                        "-o",
                        "jsonpath={.items[0].status.conditions[?(@.type=='Available')].status}",
                    ])
                    .await
                    .map(|output| output.stdout.trim() == "True")
                    .unwrap_or(false)
            }
        },
    )
    .await?;
    Ok(())
}

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new(
            TestItem::new(
                "test_cnv_upgrade_process_production_source",
                "tests/install_upgrade_operators/product_upgrade/test_upgrade.rs",
            )
            .with_markers([
                Marker::Upgrade,
                Marker::CnvUpgrade,
                Marker::Polarion("CNV-4509".to_string()),
            ]),
            |ctx| async move {
                hyperconverged_ready(&ctx).await?;
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "subscription",
                        "-n",
                        namespaces::OPENSHIFT_CNV,
                        "-o",
                        "jsonpath={.items[0].spec.source}",
                    ])
                    .await?;
                ensure(
                    output.stdout.trim() == "redhat-operators",
                    "production upgrade must subscribe to the redhat-operators catalog",
                )
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_cnv_upgrade_process_osbs_source",
                "tests/install_upgrade_operators/product_upgrade/test_upgrade.rs",
            )
            .with_markers([
                Marker::Upgrade,
                Marker::CnvUpgrade,
                Marker::Polarion("CNV-4510".to_string()),
            ]),
            |ctx| async move {
                hyperconverged_ready(&ctx).await?;
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "catalogsource",
                        "-n",
                        "openshift-marketplace",
                        "-o",
                        "jsonpath={.items[*].metadata.name}",
                    ])
                    .await?;
                ensure(
                    output.stdout.contains("cnv-index"),
                    "staged upgrade requires the cnv index-image catalog source",
                )
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_ocp_upgrade_process",
                "tests/install_upgrade_operators/ocp_upgrade/test_ocp_upgrade.rs",
            )
            .with_markers([
                Marker::Upgrade,
                Marker::OcpUpgrade,
                Marker::Polarion("CNV-6871".to_string()),
            ]),
            |ctx| async move {
                let cluster = ctx.cluster.clone();
                wait_for_condition(
                    "cluster operators settled after upgrade",
                    Duration::from_secs(30),
                    Duration::from_secs(600),
                    move || {
                        let cluster = cluster.clone();
                        async move {
                            cluster
                                .oc(&[
                                    "get",
                                    "clusterversion",
                                    "-o",
                                    "jsonpath={.items[0].status.conditions[?(@.type=='Progressing')].status}",
                                ])
                                .await
                                .map(|output| output.stdout.trim() == "False")
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
                "test_eus_upgrade_process",
                "tests/install_upgrade_operators/eus_upgrade/test_eus_upgrade.rs",
            )
            .with_markers([
                Marker::Upgrade,
                Marker::EusUpgrade,
                Marker::Polarion("CNV-8344".to_string()),
            ]),
            |ctx| async move {
                hyperconverged_ready(&ctx).await?;
                Ok(())
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_cnv_custom_lane_health",
                "tests/install_upgrade_operators/custom_lanes/test_custom_lane.rs",
            )
            .with_markers([
                Marker::UpgradeCustom,
                Marker::CnvUpgrade,
                Marker::Polarion("CNV-9614".to_string()),
            ]),
            |ctx| async move {
                hyperconverged_ready(&ctx).await?;
                Ok(())
            },
        ),
    ]
}
