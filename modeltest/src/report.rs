//! Run reporting: per-scenario console lines and the JSON report file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use interact::{RunReport, ScenarioResult, ScenarioStatus};

/// Contents of the `--report` file.
#[derive(Debug, Serialize)]
pub struct ReportFile<'a> {
    pub suite: &'a str,
    /// SHA-256 of the suite file, to tell reports of edited suites apart.
    pub suite_hash: String,
    pub command: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub passed: usize,
    pub failed: usize,
    pub results: &'a [ScenarioResult],
}

impl<'a> ReportFile<'a> {
    pub fn new(
        suite: &'a str,
        suite_hash: String,
        command: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        report: &'a RunReport,
    ) -> Self {
        let duration = finished_at - started_at;
        Self {
            suite,
            suite_hash,
            command,
            start_time: started_at.to_rfc3339(),
            end_time: finished_at.to_rfc3339(),
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            passed: report.passed(),
            failed: report.failed(),
            results: &report.results,
        }
    }
}

pub fn print_result<W: Write + ?Sized>(out: &mut W, result: &ScenarioResult) -> io::Result<()> {
    let failure = match &result.status {
        ScenarioStatus::Passed => {
            return writeln!(out, "-- ok: '{}' ({} ms)", result.name, result.duration_ms);
        }
        ScenarioStatus::Failed(failure) => failure,
    };
    writeln!(
        out,
        "-- FAILED: '{}' at step {} ({})",
        result.name, failure.step, failure.step_description
    )?;
    writeln!(out, "   cause: {}", failure.cause)?;
    if let Some(expected) = &failure.expected {
        writeln!(out, "   expected: {expected:?}")?;
    }
    if let Some(actual) = &failure.actual {
        writeln!(out, "   actual:   {actual:?}")?;
    }
    if !failure.transcript.is_empty() {
        writeln!(out, "   transcript:")?;
        for line in failure.transcript.lines() {
            writeln!(out, "     {line}")?;
        }
    }
    Ok(())
}

pub fn print_summary<W: Write + ?Sized>(out: &mut W, report: &RunReport) -> io::Result<()> {
    writeln!(
        out,
        "result: passed={} failed={} total={}",
        report.passed(),
        report.failed(),
        report.results.len()
    )
}

pub fn write_report(path: &Path, report: &ReportFile<'_>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(report).context("serialize report")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write report {}", path.display()))?;
    Ok(())
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}
