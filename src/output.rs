//! CLI output formatting for batch runs and the watch loop.
//!
//! # Output Format
//!
//! ## Catalogs, retina and previews
//!
//! ```text
//! icon.png → app-icons (23 outputs)
//!     Icon-29x29.png 29x29: generated
//!     Icon-40x40.png 40x40: cached
//!     Icon-broken.txt: FAILED Encode failed: Unsupported image format: '.txt'
//!
//! Wrote 21, unchanged 1, failed 1
//!     Icon-broken.txt: Encode failed: Unsupported image format: '.txt'
//! ```
//!
//! ## Watch
//!
//! ```text
//! res/: 12 sources, 2 regenerated
//! res/button@2x.png: regenerated (2 written)
//!     removed button.png
//! res/old@2x.png: source removed
//!     removed old.png
//!     removed old@3x.png
//! Stopped watching res/: directory removed
//! ```
//!
//! # Architecture
//!
//! Every display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchReport, EntryStatus};
use crate::watch::{WatchOutcome, WatchStats};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Last path component, falling back to the whole path.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Batch output
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::SourceStarted {
            source,
            label,
            output_count,
        } => vec![format!(
            "{} → {} ({})",
            source.display(),
            label,
            plural(*output_count, "output")
        )],
        BatchEvent::OutputDone {
            output,
            width,
            height,
            status,
        } => {
            let status = match status {
                EntryStatus::Cached => "cached",
                EntryStatus::Generated => "generated",
            };
            vec![format!(
                "{}{} {}x{}: {}",
                indent(1),
                file_name(output),
                width,
                height,
                status
            )]
        }
        BatchEvent::OutputFailed { output, reason } => {
            vec![format!("{}{}: FAILED {}", indent(1), file_name(output), reason)]
        }
        BatchEvent::SourceRenamed { from, to } => {
            vec![format!("Renamed {} → {}", from.display(), to.display())]
        }
    }
}

/// Totals line plus one line per failure.
pub fn format_report_summary(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Wrote {}, unchanged {}, failed {}",
        report.written.len(),
        report.unchanged.len(),
        report.failed.len()
    )];
    for failure in &report.failed {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            failure.path.display(),
            failure.reason
        ));
    }
    lines
}

pub fn print_batch_event(event: &BatchEvent) {
    for line in format_batch_event(event) {
        println!("{}", line);
    }
}

pub fn print_report_summary(report: &BatchReport) {
    for line in format_report_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Watch output
// ============================================================================

/// Format one watch outcome. Quiet outcomes (ignored events, unchanged
/// content) produce no lines.
pub fn format_watch_outcome(outcome: &WatchOutcome) -> Vec<String> {
    match outcome {
        WatchOutcome::Ignored | WatchOutcome::OwnDerivative | WatchOutcome::Unchanged => {
            Vec::new()
        }
        WatchOutcome::Regenerated {
            source,
            removed,
            written,
            failed,
        } => {
            let detail = if *failed > 0 {
                format!("{} written, {} failed", written, failed)
            } else {
                format!("{} written", written)
            };
            let mut lines = vec![format!("{}: regenerated ({})", source.display(), detail)];
            lines.extend(removed_lines(removed));
            lines
        }
        WatchOutcome::Pruned { source, removed } => {
            let mut lines = vec![format!("{}: source removed", source.display())];
            lines.extend(removed_lines(removed));
            lines
        }
        WatchOutcome::RootDropped { root, reason } => {
            vec![format!("Stopped watching {}: {}", root.display(), reason)]
        }
        WatchOutcome::Synced {
            root,
            sources,
            regenerated,
        } => vec![format!(
            "{}: {}, {} regenerated",
            root.display(),
            plural(*sources, "source"),
            regenerated
        )],
    }
}

fn removed_lines(removed: &[std::path::PathBuf]) -> impl Iterator<Item = String> + '_ {
    removed
        .iter()
        .map(|p| format!("{}removed {}", indent(1), file_name(p)))
}

/// Closing summary of a watch run.
pub fn format_watch_stats(stats: &WatchStats) -> Vec<String> {
    let mut lines = vec![format!(
        "Watch stopped: {} regenerated, {} removed, {} ignored, {} unchanged",
        stats.regenerated, stats.pruned, stats.ignored, stats.unchanged
    )];
    if stats.dropped_roots > 0 {
        lines.push(format!(
            "{}{} dropped",
            indent(1),
            plural(stats.dropped_roots as usize, "root")
        ));
    }
    lines
}

pub fn print_watch_outcome(outcome: &WatchOutcome) {
    for line in format_watch_outcome(outcome) {
        println!("{}", line);
    }
}

pub fn print_watch_stats(stats: &WatchStats) {
    for line in format_watch_stats(stats) {
        println!("{}", line);
    }
}
