//! Storage-area suite: storage classes, data import crons, snapshots.

use common::error::TestError;
use harness::item::{Marker, TestItem};
use harness::runner::TestCase;

use super::ensure;

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new(
            TestItem::new(
                "test_storage_classes_exist",
                "tests/storage/test_storage_classes.rs",
            )
            .with_markers([Marker::Polarion("CNV-2147".to_string())])
            .with_fixtures(["storage_class_matrix__module__"]),
            |ctx| async move {
                let Some(matrix) = ctx.config.matrix("storage_class_matrix") else {
                    return Err(TestError::StorageSanity(
                        "storage_class_matrix is not configured".to_string(),
                    ));
                };
                for value in matrix.values() {
                    let output = ctx
                        .cluster
                        .oc(&["get", "storageclass", value.id(), "-o", "name"])
                        .await?;
                    ensure(
                        output.stdout.contains(value.id()),
                        format!("storage class {} not found on the cluster", value.id()),
                    )?;
                }
                Ok(())
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_default_storage_class_configured",
                "tests/storage/test_storage_classes.rs",
            )
            .with_markers([Marker::Polarion("CNV-4783".to_string())]),
            |ctx| async move {
                ensure(
                    !ctx.config.default_storage_class.is_empty(),
                    "no default storage class resolved for this run",
                )
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_data_import_cron_ready",
                "tests/storage/data_import_cron/test_data_import_cron.rs",
            )
            .with_markers([Marker::Polarion("CNV-7531".to_string())]),
            |ctx| async move {
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "dataimportcron",
                        "-A",
                        "-o",
                        "jsonpath={.items[*].metadata.name}",
                    ])
                    .await?;
                ensure(
                    !output.stdout.trim().is_empty(),
                    "no data import crons found on the cluster",
                )
            },
        ),
        TestCase::new(
            TestItem::new(
                "test_snapshot_class_for_snapshot_capable_storage",
                "tests/storage/snapshots/test_snapshot_classes.rs",
            )
            .with_markers([Marker::Polarion("CNV-6824".to_string())])
            // Dynamic matrix: only storage classes with snapshot support.
            .with_fixtures(["storage_class_matrix_snapshot_matrix__module__"]),
            |ctx| async move {
                let output = ctx
                    .cluster
                    .oc(&[
                        "get",
                        "volumesnapshotclass",
                        "-o",
                        "jsonpath={.items[*].driver}",
                    ])
                    .await?;
                ensure(
                    !output.stdout.trim().is_empty(),
                    "no volume snapshot classes found for snapshot-capable storage",
                )
            },
        ),
    ]
}
