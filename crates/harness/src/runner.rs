//! Sequential test runner.
//!
//! Executes the selected test cases one at a time: records the start time in
//! the diagnostic store, emits phase separators, routes the outcome to the
//! reporter and, on failure, to the diagnostics collector. Test execution is
//! single-threaded by design; cluster-state tests do not tolerate
//! interleaving.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::cluster::ClusterClient;
use crate::config::RunConfig;
use crate::diagnostics::{Collector, DiagnosticStore};
use crate::item::TestItem;
use crate::report::{Phase, Reporter, RunSummary, Status, TestReport};
use common::error::Result as TestResult;

/// Shared context handed to every test body.
pub struct RunContext {
    pub config: Arc<RunConfig>,
    pub cluster: Arc<ClusterClient>,
}

/// A test body: an async function over the shared run context.
pub type TestBody =
    Arc<dyn Fn(Arc<RunContext>) -> Pin<Box<dyn Future<Output = TestResult<()>> + Send>> + Send + Sync>;

/// A test item paired with its executable body.
#[derive(Clone)]
pub struct TestCase {
    pub item: TestItem,
    body: TestBody,
}

impl TestCase {
    pub fn new<F, Fut>(item: TestItem, body: F) -> Self
    where
        F: Fn(Arc<RunContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult<()>> + Send + 'static,
    {
        Self {
            item,
            body: Arc::new(move |ctx| Box::pin(body(ctx))),
        }
    }

    pub async fn execute(&self, ctx: Arc<RunContext>) -> TestResult<()> {
        (self.body)(ctx).await
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase").field("item", &self.item).finish()
    }
}

/// Sequential executor for the selected cases.
pub struct Runner {
    ctx: Arc<RunContext>,
    reporter: Reporter,
    collector: Collector,
    store: Option<DiagnosticStore>,
    deselected: usize,
}

impl Runner {
    pub fn new(
        ctx: Arc<RunContext>,
        collector: Collector,
        store: Option<DiagnosticStore>,
        deselected: usize,
    ) -> Self {
        Self {
            ctx,
            reporter: Reporter::new(),
            collector,
            store,
            deselected,
        }
    }

    /// Run every case in order, returning the aggregate summary and the
    /// reporter holding per-test records for the HTML report.
    pub async fn run(mut self, cases: Vec<TestCase>) -> (RunSummary, Reporter) {
        let mut summary = RunSummary {
            collected: cases.len() + self.deselected,
            deselected: self.deselected,
            ..RunSummary::default()
        };

        for case in &cases {
            self.run_case(case, &mut summary).await;
        }

        (summary, self.reporter)
    }

    async fn run_case(&mut self, case: &TestCase, summary: &mut RunSummary) {
        let item = &case.item;
        self.reporter.emit_separator('-', item.name());
        self.collector.set_test_directory(item);

        if let Some(reason) = item.skip_reason() {
            self.reporter.report(
                TestReport::new(item.name(), Phase::Setup, Status::Skipped)
                    .with_skip_reason(reason),
            );
            match self.reporter.records().last().map(|record| record.status) {
                Some(Status::Quarantined) => summary.quarantined += 1,
                _ => summary.skipped += 1,
            }
            self.collector.reset_directory();
            return;
        }

        self.reporter.emit_separator('-', "SETUP");
        if let Some(store) = &self.store {
            // Before setup work starts, record the current epoch time.
            let start_time = chrono::Utc::now().timestamp();
            if let Err(store_error) = store.insert_start_time(&item.full_name(), start_time) {
                error!(
                    "Store error: {store_error}. Diagnostic collection may not be accurate"
                );
            }
        }

        self.reporter.emit_separator('-', "CALL");
        let started = Instant::now();
        let outcome = case.execute(self.ctx.clone()).await;
        let duration = started.elapsed().as_secs_f64();

        match outcome {
            Ok(()) => {
                info!(test = %item.full_name(), "Test passed");
                self.reporter.report(
                    TestReport::new(item.name(), Phase::Call, Status::Passed)
                        .with_duration(duration),
                );
                summary.passed += 1;
            }
            Err(test_error) => {
                let failure_text = format!("{}::{} {test_error}", item.path(), item.name());
                self.reporter.report(
                    TestReport::new(item.name(), Phase::Call, Status::Failed)
                        .with_failure_text(&failure_text)
                        .with_duration(duration),
                );
                summary.failed += 1;
                self.collector
                    .on_exception(self.store.as_ref(), item, &test_error, &failure_text)
                    .await;
            }
        }

        self.reporter.emit_separator('-', "TEARDOWN");
        self.collector.reset_directory();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::testing::RecordingRunner;
    use crate::config::{Arch, RunConfig};
    use crate::options::RunOptions;
    use clap::Parser;
    use common::error::TestError;
    use std::path::PathBuf;

    fn context() -> Arc<RunContext> {
        let opts =
            RunOptions::try_parse_from(["virt-tests"]).expect("options should parse");
        let config = RunConfig::resolve(&opts, Arch::X86_64).unwrap();
        let cluster =
            ClusterClient::new(Arc::new(RecordingRunner::succeeding())).unwrap();
        Arc::new(RunContext {
            config: Arc::new(config),
            cluster: Arc::new(cluster),
        })
    }

    fn disabled_collector() -> Collector {
        Collector::new(
            false,
            PathBuf::from("/tmp/collected"),
            Arc::new(RecordingRunner::succeeding()),
        )
    }

    fn passing_case(name: &str) -> TestCase {
        TestCase::new(
            TestItem::new(name, "tests/virt/test_smoke.rs"),
            |_ctx| async { Ok(()) },
        )
    }

    fn failing_case(name: &str) -> TestCase {
        TestCase::new(
            TestItem::new(name, "tests/virt/test_smoke.rs"),
            |_ctx| async { Err(TestError::Assertion("expected Running".into())) },
        )
    }

    #[tokio::test]
    async fn test_summary_counts_outcomes() {
        let runner = Runner::new(context(), disabled_collector(), None, 2);
        let mut skipped = passing_case("test_skipped");
        skipped.item.mark_skipped("requires special infra");

        let (summary, _reporter) = runner
            .run(vec![
                passing_case("test_pass"),
                failing_case("test_fail"),
                skipped,
            ])
            .await;

        assert_eq!(summary.collected, 5);
        assert_eq!(summary.deselected, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_quarantined_skip_counted_separately() {
        let runner = Runner::new(context(), disabled_collector(), None, 0);
        let mut case = passing_case("test_flaky");
        case.item.mark_skipped("quarantined: CNV-4242 host networking flake");

        let (summary, reporter) = runner.run(vec![case]).await;
        assert_eq!(summary.quarantined, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(reporter.records()[0].status, Status::Quarantined);
    }

    #[tokio::test]
    async fn test_start_time_recorded_for_executed_tests() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticStore::open(dir.path()).unwrap();
        let runner = Runner::new(context(), disabled_collector(), Some(store), 0);

        let (summary, _reporter) = runner.run(vec![passing_case("test_pass")]).await;
        assert_eq!(summary.passed, 1);

        let store = DiagnosticStore::open(dir.path()).unwrap();
        let recorded = store
            .get_start_time("tests/virt/test_smoke.rs::test_pass")
            .unwrap();
        assert!(recorded.is_some());
        assert!(recorded.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_failure_triggers_collection() {
        let oc_calls = Arc::new(RecordingRunner::succeeding());
        let collector = Collector::new(true, PathBuf::from("/tmp/collected"), oc_calls.clone());
        let runner = Runner::new(context(), collector, None, 0);

        let case = TestCase::new(
            TestItem::new("test_dv_import", "tests/storage/test_dv_import.rs"),
            |_ctx| async { Err(TestError::Assertion("import never completed".into())) },
        );
        let (summary, _reporter) = runner.run(vec![case]).await;
        assert_eq!(summary.failed, 1);
        // Bundle plus storage-area inspect.
        assert_eq!(oc_calls.recorded_calls().len(), 2);
    }
}
