//! Result reporting.
//!
//! Emits colorized per-test status lines, captures setup-error and
//! quarantine annotations, and renders the HTML results report with the
//! `Links` column replaced by `Setup Error Reason` and `Quarantined Reason`
//! columns.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

use common::constants::QUARANTINED;

const GREEN: &str = "\x1b[0;32m";
const RED: &str = "\x1b[0;31m";
const YELLOW: &str = "\x1b[1;33m";
const RESET: &str = "\x1b[0m";

const HTML_REPORT_TITLE: &str = "Openshift Virtualization Tier2 Tests Results";

const SEPARATOR_WIDTH: usize = 100;

#[allow(clippy::expect_used)]
static SETUP_FAILED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Failed): (.*?)(\n|$)").expect("static regex is valid"));

#[allow(clippy::expect_used)]
static TRACKING_ISSUE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CNV-\d+").expect("static regex is valid"));

/// Execution phase a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Call,
    Teardown,
}

/// Final status of one phase of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
    Error,
    Skipped,
    Xfailed,
    Quarantined,
}

/// Report for one phase of one test.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub head_line: String,
    pub phase: Phase,
    pub status: Status,
    pub failure_text: Option<String>,
    pub skip_reason: Option<String>,
    pub setup_error: Option<String>,
    pub quarantined_reason: Option<String>,
    pub duration_seconds: f64,
}

impl TestReport {
    pub fn new(head_line: impl Into<String>, phase: Phase, status: Status) -> Self {
        Self {
            head_line: head_line.into(),
            phase,
            status,
            failure_text: None,
            skip_reason: None,
            setup_error: None,
            quarantined_reason: None,
            duration_seconds: 0.0,
        }
    }

    pub fn with_failure_text(mut self, text: impl Into<String>) -> Self {
        self.failure_text = Some(text.into());
        self
    }

    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }
}

/// A line of `symbol` characters with `val` centered in it.
pub fn separator(symbol: char, val: &str) -> String {
    let label = format!(" {val} ");
    if label.len() >= SEPARATOR_WIDTH {
        return label;
    }
    let fill = SEPARATOR_WIDTH - label.len();
    let left = fill / 2;
    let right = fill - left;
    format!(
        "{}{}{}",
        symbol.to_string().repeat(left),
        label,
        symbol.to_string().repeat(right)
    )
}

/// Rewrite tracking-issue ids into HTML links for the report.
fn linkify_tracking_issues(reason: &str) -> String {
    TRACKING_ISSUE_PATTERN
        .replace_all(reason, |captures: &regex::Captures<'_>| {
            let id = &captures[0];
            format!("<a href='https://issues.redhat.com/browse/{id}' target='_blank'>{id}</a>")
        })
        .into_owned()
}

/// Collects per-test reports, prints status lines, and renders the HTML
/// report at session end.
#[derive(Debug, Default)]
pub struct Reporter {
    records: Vec<TestReport>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TestReport] {
        &self.records
    }

    pub fn emit_separator(&self, symbol: char, val: &str) {
        info!(target: "basic", "\n{}", separator(symbol, val));
    }

    /// Record a report: enrich setup-phase annotations, print the status
    /// line, and keep the record for the HTML report.
    pub fn report(&mut self, mut report: TestReport) {
        self.enrich_setup_report(&mut report);
        self.print_status(&report);
        self.records.push(report);
    }

    /// Setup-phase enrichment: quarantined skips and setup-error reasons.
    fn enrich_setup_report(&self, report: &mut TestReport) {
        if report.phase != Phase::Setup {
            return;
        }

        if let Some(reason) = report.skip_reason.clone() {
            if reason.contains(QUARANTINED) {
                report.status = Status::Quarantined;
                report.quarantined_reason = Some(linkify_tracking_issues(&reason));
                return;
            }
        }

        if let Some(text) = report.failure_text.clone() {
            if let Some(captures) = SETUP_FAILED_PATTERN.captures(&text) {
                report.setup_error = Some(captures[2].to_string());
            } else if let Some(first_line) = text.lines().next() {
                report.setup_error = Some(first_line.to_string());
            }
        }
    }

    fn print_status(&self, report: &TestReport) {
        let name = &report.head_line;
        match report.status {
            Status::Passed => {
                if report.phase == Phase::Call {
                    info!(target: "basic", "\nTEST: {name} STATUS: {GREEN}PASSED{RESET}");
                }
            }
            Status::Skipped | Status::Xfailed | Status::Quarantined => {
                let skip_type = match report.status {
                    Status::Quarantined => "QUARANTINED",
                    Status::Xfailed => "XFAILED",
                    _ => "SKIPPED",
                };
                info!(target: "basic", "\nTEST: {name} STATUS: {YELLOW}{skip_type}{RESET}");
            }
            Status::Failed | Status::Error => {
                if report.phase == Phase::Call {
                    info!(target: "basic", "\nTEST: {name} STATUS: {RED}FAILED{RESET}");
                } else {
                    let phase = match report.phase {
                        Phase::Setup => "setup",
                        Phase::Teardown => "teardown",
                        Phase::Call => "call",
                    };
                    info!(target: "basic", "\nTEST: {name} [{phase}] STATUS: {RED}ERROR{RESET}");
                }
            }
        }
    }

    /// Render the HTML results report.
    pub fn write_html_report(&self, path: &Path) -> std::io::Result<()> {
        let mut rows = String::new();
        for record in &self.records {
            let result = match record.status {
                Status::Passed => "Passed",
                Status::Failed => "Failed",
                Status::Error => "Error",
                Status::Skipped => "Skipped",
                Status::Xfailed => "XFailed",
                Status::Quarantined => "Quarantined",
            };
            // The Links cells are replaced by the error/quarantine reasons.
            let (setup_error_cell, quarantined_cell) =
                if let Some(reason) = &record.quarantined_reason {
                    (String::new(), reason.clone())
                } else if let Some(message) = &record.setup_error {
                    (message.clone(), String::new())
                } else {
                    (String::new(), String::new())
                };

            rows.push_str(&format!(
                "    <tr><td>{}</td><td>{}</td><td>{:.2}s</td><th>{}</th><th>{}</th></tr>\n",
                record.head_line, result, record.duration_seconds, setup_error_cell, quarantined_cell
            ));
        }

        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{HTML_REPORT_TITLE}</title></head>\n<body>\n\
             <h1>{HTML_REPORT_TITLE}</h1>\n<table>\n  <thead>\n    <tr>\
             <th>Test</th><th>Result</th><th>Duration</th>\
             <th>Setup Error Reason</th><th>Quarantined Reason</th></tr>\n  </thead>\n  <tbody>\n\
             {rows}  </tbody>\n</table>\n</body>\n</html>\n"
        );
        std::fs::write(path, html)
    }
}

/// Aggregate run outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub collected: usize,
    pub deselected: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub quarantined: usize,
}

impl RunSummary {
    /// Print the terminal summary line.
    pub fn print(&self) {
        info!(
            target: "basic",
            "\n{}",
            separator('=', &format!(
                "{} passed, {} failed, {} errors, {} skipped, {} quarantined, {} deselected",
                self.passed, self.failed, self.errors, self.skipped, self.quarantined,
                self.deselected
            ))
        );
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 || self.errors > 0 {
            1
        } else {
            0
        }
    }
}
