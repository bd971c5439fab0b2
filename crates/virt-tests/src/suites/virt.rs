//! Virt-area suite: machine types, node policies, special hardware.

use std::time::Duration;

use common::constants::namespaces;
use harness::item::{Marker, TestItem};
use harness::runner::TestCase;
use harness::wait::wait_for_condition;

use super::ensure;

pub fn cases() -> Vec<TestCase> {
    let mut cases = vec![
        TestCase::new(
            TestItem::new("test_default_machine_type", "tests/virt/node/test_machine_type.rs")
                .with_markers([Marker::Polarion("CNV-3798".to_string())])
                .with_fixtures(["rhel_os_matrix__class__"]),
            |ctx| async move {
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "kubevirt",
                        "-n",
                        namespaces::OPENSHIFT_CNV,
                        "-o",
                        "jsonpath={.items[0].spec.configuration.machineType}",
                    ])
                    .await?;
                // An unset machine type falls back to the cluster default q35.
                let machine_type = output.stdout.trim();
                ensure(
                    machine_type.is_empty() || machine_type.contains("q35"),
                    format!("unexpected default machine type: {machine_type}"),
                )
            },
        ),
        TestCase::new(
            TestItem::new("test_virt_controller_ready", "tests/virt/general/test_control_plane.rs")
                .with_markers([Marker::Polarion("CNV-2569".to_string())]),
            |ctx| async move {
                let cluster = ctx.cluster.clone();
                wait_for_condition(
                    "virt-controller pods ready",
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
                                    "kubevirt.io=virt-controller",
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
                "test_custom_selinux_policy_removed",
                "tests/virt/node/test_custom_selinux_policy.rs",
            )
            .with_markers([Marker::Polarion("CNV-8689".to_string())]),
            |ctx| async move {
                // The legacy custom policy must not be installed on any node.
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "kubevirt",
                        "-n",
                        namespaces::OPENSHIFT_CNV,
                        "-o",
                        "jsonpath={.items[0].spec.configuration.developerConfiguration.featureGates}",
                    ])
                    .await?;
                ensure(
                    !output.stdout.contains("CustomSELinuxPolicy"),
                    "legacy custom SELinux policy feature gate still present",
                )
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_gpu_device_plugin_available",
                "tests/virt/special_infra/test_gpu_passthrough.rs",
            )
            .with_markers([
                Marker::SpecialInfra,
                Marker::Gpu,
                Marker::Polarion("CNV-4782".to_string()),
            ]),
            |ctx| async move {
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "pods",
                        "-n",
                        namespaces::NVIDIA_GPU_OPERATOR,
                        "-o",
                        "jsonpath={.items[*].metadata.name}",
                    ])
                    .await?;
                ensure(
                    output.stdout.contains("nvidia-device-plugin"),
                    "nvidia device plugin pods not found",
                )
            },
        ),
        TestCase::new(
            TestItem::new("test_swap_enabled_workers", "tests/virt/node/test_swap.rs")
                .with_markers([Marker::Swap, Marker::Polarion("CNV-9247".to_string())]),
            |ctx| async move {
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "pods",
                        "-n",
                        namespaces::WASP,
                        "-o",
                        "jsonpath={.items[*].status.phase}",
                    ])
                    .await?;
                ensure(
                    output.stdout.split_whitespace().all(|phase| phase == "Running"),
                    "wasp agent pods not all running",
                )
            },
        ),
    ];

    let mut quarantined = TestItem::new(
        "test_vm_boot_storage_classes",
        "tests/virt/general/test_vm_boot.rs",
    )
    .with_markers([Marker::Polarion("CNV-7112".to_string())])
    .with_fixtures(["storage_class_matrix__function__"]);
    quarantined.mark_skipped("quarantined: CNV-57231 slow image pull on congested clusters");
    cases.push(TestCase::new(quarantined, |_ctx| async { Ok(()) }));

    cases
}
