//! Run reports.
//!
//! Plain-text summary of every run, plus an error log listing each failed
//! unit with its cause and findings.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::RunSummary;

const RULE: &str = "============================================================";

/// Processing summary text.
pub fn render_summary(summary: &RunSummary) -> String {
    let totals = summary.totals();
    let mut out = String::new();

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "PROCESSING SUMMARY{}", if summary.dry_run { " (DRY RUN)" } else { "" });
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Started:            {}", summary.started_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Elapsed:            {:.2}s", summary.elapsed.as_secs_f64());
    let _ = writeln!(out);
    let _ = writeln!(out, "Files processed:    {}", summary.total());
    let _ = writeln!(out, "Files succeeded:    {}", summary.succeeded());
    let _ = writeln!(out, "Files failed:       {}", summary.failed());
    let _ = writeln!(out);
    let _ = writeln!(out, "Rows processed:     {}", totals.rows_processed);
    let _ = writeln!(out, "Transactions:       {}", totals.transactions_created);
    let _ = writeln!(out, "Line items:         {}", totals.line_items_created);
    let _ = writeln!(out, "Validation errors:  {}", totals.validation_errors);
    let _ = writeln!(out, "Validation warnings: {}", totals.validation_warnings);

    if !summary.results.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Files:");
        let mut results: Vec<_> = summary.results.iter().collect();
        results.sort_by(|a, b| a.input.cmp(&b.input));
        for result in results {
            let status = if result.success { "OK    " } else { "FAILED" };
            let _ = write!(
                out,
                "  [{}] {} ({} rows, {} transactions, {} line items, {:.2}s)",
                status,
                result.file_name(),
                result.stats.rows_processed,
                result.stats.transactions_created,
                result.stats.line_items_created,
                result.elapsed.as_secs_f64()
            );
            if let Some(path) = &result.output_path {
                let _ = write!(out, " -> {}", path.display());
            }
            let _ = writeln!(out);
        }
    }

    out
}

/// Error log text, `None` when nothing failed.
pub fn render_error_log(summary: &RunSummary) -> Option<String> {
    if summary.failed() == 0 {
        return None;
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "ERROR LOG ({} failed file(s))", summary.failed());
    let _ = writeln!(out, "{}", RULE);

    for result in summary.failures() {
        let _ = writeln!(out);
        let _ = writeln!(out, "File: {}", result.input.display());
        if let Some(department) = &result.department {
            let _ = writeln!(out, "Department: {}", department);
        }
        let _ = writeln!(out, "Error: {}", result.error.as_deref().unwrap_or("unknown error"));
        for (i, finding) in result.findings.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, finding);
        }
    }

    Some(out)
}

/// Write the report files into `output_dir/reports/`. Skipped on dry runs.
pub fn write_reports(summary: &RunSummary, output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if summary.dry_run {
        return Ok(Vec::new());
    }

    let dir = output_dir.join("reports");
    fs::create_dir_all(&dir)?;
    let timestamp = summary.started_at.format("%Y%m%d_%H%M%S");

    let summary_path = dir.join(format!("processing_summary_{}.txt", timestamp));
    fs::write(&summary_path, render_summary(summary))?;
    let mut written = vec![summary_path];

    if let Some(log) = render_error_log(summary) {
        let log_path = dir.join(format!("error_log_{}.txt", timestamp));
        fs::write(&log_path, log)?;
        written.push(log_path);
    }

    Ok(written)
}
