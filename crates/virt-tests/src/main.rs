//! Virtualization environment test runner.
//!
//! Wires the harness together: parse options, start the session, collect
//! and filter the registered suites, run them sequentially against the live
//! cluster, write the HTML report, and tear the session down.

mod registry;
mod suites;

use clap::Parser;
use std::sync::Arc;
use tracing::warn;

use harness::diagnostics::{Collector, DiagnosticStore};
use harness::matrix::ConfigMatrixSource;
use harness::options::RunOptions;
use harness::report::RunSummary;
use harness::runner::{RunContext, Runner};
use harness::selection::{self, DeselectionLog};
use harness::session::Session;

const HTML_REPORT_FILE: &str = "virt-tests-report.html";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = RunOptions::parse();
    let session = Session::start(options).await?;

    let mut sink = DeselectionLog::default();
    let selected = match selection::collect(
        registry::all(),
        &session.options,
        &session.config,
        &ConfigMatrixSource,
        &mut sink,
    ) {
        Ok(selected) => selected,
        Err(selection_error) => {
            session.finish(&RunSummary::default()).await;
            return Err(selection_error.into());
        }
    };

    if session.options.collect_only {
        for case in &selected {
            println!("{}", case.item.full_name());
        }
        let summary = RunSummary {
            collected: selected.len() + sink.count,
            deselected: sink.count,
            ..RunSummary::default()
        };
        session.finish(&summary).await;
        return Ok(());
    }

    let store = if session.options.data_collector {
        Some(DiagnosticStore::open(&session.config.collector_base_directory)?)
    } else {
        None
    };
    let collector = Collector::new(
        session.options.data_collector,
        session.config.collector_base_directory.clone(),
        session.cluster.runner(),
    );

    let ctx = Arc::new(RunContext {
        config: session.config.clone(),
        cluster: session.cluster.clone(),
    });
    let runner = Runner::new(ctx, collector, store, sink.count);
    let (summary, reporter) = runner.run(selected).await;

    let report_path = session
        .config
        .collector_base_directory
        .join(HTML_REPORT_FILE);
    if let Err(report_error) = reporter.write_html_report(&report_path) {
        warn!(
            "Failed to write HTML report {}: {report_error}",
            report_path.display()
        );
    }

    let exit_code = summary.exit_code();
    session.finish(&summary).await;

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
