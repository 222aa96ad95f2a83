//! Command output
//!
//! Human output goes to the terminal as checkmarked lines. With `--json`
//! stdout carries exactly one JSON document per command; warnings and
//! errors go to stderr.

use blobferry_core::domain::{JobStatus, ReplicationReport};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    /// Prints the outcome of a replication job
    fn report(&self, report: &ReplicationReport);
}

/// Headline for a finished job, `None` while it is still running
fn report_headline(report: &ReplicationReport) -> Option<String> {
    let id = report.job_id();
    match report.status() {
        JobStatus::Completed if report.is_dry_run() => Some(format!("Dry run {id} completed")),
        JobStatus::Completed => Some(format!("Job {id} completed")),
        JobStatus::Cancelled => Some(format!("Job {id} cancelled")),
        JobStatus::Failed => Some(match report.failure() {
            Some(e) => format!("Job {id} failed: {e}"),
            None => format!("Job {id} failed"),
        }),
        JobStatus::NotStarted | JobStatus::Running => None,
    }
}

/// Counter line followed by one line per written URI
fn report_details(report: &ReplicationReport) -> Vec<String> {
    let verb = if report.is_dry_run() {
        "would transfer"
    } else {
        "transferred"
    };
    let mut lines = vec![format!(
        "{} entries read, {} {}, {} skipped, {} bytes",
        report.entries_read(),
        report.transferred(),
        verb,
        report.skipped(),
        report.bytes_written()
    )];
    lines.extend(report.uris().iter().map(|uri| format!("  {uri}")));
    lines
}

/// JSON document for a report
fn report_json(report: &ReplicationReport) -> serde_json::Value {
    let mut value = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
    if let Some(map) = value.as_object_mut() {
        map.insert("success".into(), report.status().is_success().into());
    }
    value
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}

    fn report(&self, report: &ReplicationReport) {
        if let Some(headline) = report_headline(report) {
            match report.status() {
                JobStatus::Completed => self.success(&headline),
                JobStatus::Cancelled => self.warn(&headline),
                _ => self.error(&headline),
            }
        }
        for line in report_details(report) {
            self.info(&line);
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, _message: &str) {}
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }

    fn report(&self, report: &ReplicationReport) {
        self.print_json(&report_json(report));
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    if format.is_json() {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
