//! Plain-text rendering of engine reports.
//!
//! JSON output is the serde form of the report types; this module only
//! covers the console layout.

use std::fmt::Write;

use crate::recalc::{Change, LintReport, RecalcReport};

fn date_label(change: &Change) -> String {
    change
        .completed_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "----------".to_string())
}

fn write_change(out: &mut String, change: &Change) {
    let added: Vec<&str> = change.added().map(String::as_str).collect();
    let removed: Vec<&str> = change.removed().map(String::as_str).collect();

    let _ = writeln!(
        out,
        "  {}  {} [{}]",
        date_label(change),
        if change.title.is_empty() { "(untitled)" } else { change.title.as_str() },
        change.work_id
    );
    if !added.is_empty() {
        let _ = writeln!(out, "      + {}", added.join(", "));
    }
    if !removed.is_empty() {
        let _ = writeln!(out, "      - {}", removed.join(", "));
    }
}

pub fn render_recalc(report: &RecalcReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { "dry run" } else { "apply" };

    let _ = writeln!(
        out,
        "{mode}: scanned {} work(s), {} need changes",
        report.scanned, report.changed
    );
    if !report.dry_run {
        let _ = writeln!(
            out,
            "updated {}, remaining {}",
            report.updated, report.remaining
        );
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nwarnings ({} parent cycle(s)):", report.cycles);
        for warning in &report.warnings {
            let _ = writeln!(out, "  ! {warning}");
        }
    }

    if !report.samples.is_empty() {
        let _ = writeln!(
            out,
            "\nsample changes ({} of {}):",
            report.samples.len(),
            report.changed
        );
        for change in &report.samples {
            write_change(&mut out, change);
        }
    }

    if let Some(failure) = &report.failure {
        let _ = writeln!(
            out,
            "\nstopped at work {}: {}",
            failure.work_id, failure.message
        );
    } else if !report.dry_run && report.remaining > 0 {
        let _ = writeln!(out, "\nrun again to apply the remaining {}", report.remaining);
    }

    out
}

pub fn render_lint(report: &LintReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} tag(s), {} redirected by merge",
        report.tags, report.redirects
    );
    if report.warnings.is_empty() {
        let _ = writeln!(out, "no problems found");
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "  ! {warning}");
    }
    out
}
