//! CLI output formatting for write results.
//!
//! # Page-First Display
//!
//! Output leads with the page path, the identity the caller gave the page,
//! with the file it ended up in shown as secondary context on an indented
//! `Target:` line. The pipe finishes pages in no particular order, so every
//! list is sorted by page path before it is shown: the same batch always
//! prints the same way.
//!
//! # Output Format
//!
//! ```text
//! Written → dist
//! 001 /app.css (312 B)
//!     Target: dist/app.css
//! 002 /index.html (1.2 KB)
//!     Target: dist/index.html
//!
//! Failed
//! 001 /blog/index.html
//!     Error: Transform failed for /blog/index.html: ...
//!
//! Wrote 2 pages (1.5 KB), 1 failed
//! ```
//!
//! Errors that don't belong to a page (the pipe failing to start) are listed
//! under `Failed` after the page errors, without an index.
//!
//! # Architecture
//!
//! [`format_write_report`] returns `Vec<String>` for testability and
//! [`print_write_report`] writes it to stdout. The format function is pure:
//! no I/O, no side effects.

use crate::write::{WriteError, WriteReport};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count: `B` below 1 KB, one decimal above.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Write report
// ============================================================================

/// Format a write report as display lines.
pub fn format_write_report(report: &WriteReport) -> Vec<String> {
    let mut lines = Vec::new();

    let mut written: Vec<_> = report.written.iter().collect();
    written.sort_by(|a, b| a.page.cmp(&b.page));
    if !written.is_empty() {
        lines.push(format!("Written → {}", report.destination.display()));
        for (i, w) in written.iter().enumerate() {
            lines.push(format!(
                "{} {} ({})",
                format_index(i + 1),
                w.page,
                format_size(w.bytes)
            ));
            lines.push(format!("{}Target: {}", indent(1), w.target.display()));
        }
    }

    let mut page_errors: Vec<(&str, &WriteError)> = report
        .errors
        .iter()
        .filter_map(|err| err.page().map(|page| (page, err)))
        .collect();
    page_errors.sort_by(|a, b| a.0.cmp(b.0));
    let other_errors = report.errors.iter().filter(|err| err.page().is_none());

    if !report.errors.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Failed".to_string());
        for (i, (page, err)) in page_errors.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), page));
            lines.push(format!("{}Error: {}", indent(1), err));
        }
        for err in other_errors {
            lines.push(format!("{}Error: {}", indent(1), err));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let total: usize = report.written.iter().map(|w| w.bytes).sum();
    let mut summary = format!(
        "Wrote {} ({})",
        plural(report.written.len(), "page", "pages"),
        format_size(total)
    );
    if !report.errors.is_empty() {
        summary.push_str(&format!(", {} failed", report.errors.len()));
    }
    lines.push(summary);
    lines
}

pub fn print_write_report(report: &WriteReport) {
    for line in format_write_report(report) {
        println!("{}", line);
    }
}
