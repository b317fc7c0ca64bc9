//! Text output for finished scans
//!
//! One line per result on stdout, then a summary line. Errors and the
//! timeout marker are colored when the caller asks for it.

use std::io::{self, Write};

use console::Style;

use crate::results::{Outcome, Report, ScanResult, Termination};

/// Render every result followed by the summary line.
pub fn render_report(out: &mut impl Write, report: &Report, color: bool) -> io::Result<()> {
    for result in &report.results {
        render_result(out, result, color)?;
    }
    writeln!(out, "{}", summary_line(report, color))
}

/// Render one result.
///
/// Pattern scans print `path:line:text`; hash comparisons print
/// `path matched using sha256 hash`.
pub fn render_result(out: &mut impl Write, result: &ScanResult, color: bool) -> io::Result<()> {
    let path = result.path.display();
    match (&result.outcome, result.line) {
        (Outcome::Error(reason), _) => {
            let msg = format!("{path}: error: {reason}");
            writeln!(out, "{}", paint(Style::new().red(), msg, color))
        }
        (Outcome::Matched, Some(line)) => writeln!(out, "{path}:{line}:{}", result.detail),
        (Outcome::Matched, None) => {
            writeln!(out, "{path} matched using {} hash", result.detail)
        }
        (Outcome::NotMatched, _) => {
            let msg = format!("{path} did not match using {} hash", result.detail);
            writeln!(out, "{}", paint(Style::new().yellow(), msg, color))
        }
    }
}

/// `elapsed 0.012s, 8 workers, 120 files scanned, 3 matches`, with error and
/// skip counts when non-zero and a marker when the run ended early.
pub fn summary_line(report: &Report, color: bool) -> String {
    let s = &report.stats;
    let mut line = format!(
        "elapsed {:.3}s, {} workers, {} files scanned, {} matches",
        s.duration.as_secs_f64(),
        s.workers,
        s.files_scanned,
        s.matches,
    );
    if s.errors > 0 {
        line.push_str(&format!(", {} errors", s.errors));
    }
    if s.skipped > 0 {
        line.push_str(&format!(", {} skipped", s.skipped));
    }
    if s.walk_errors > 0 {
        line.push_str(&format!(", {} unreadable", s.walk_errors));
    }

    let marker = match report.termination {
        Termination::Completed => None,
        Termination::TimedOut  => Some("timed out"),
        Termination::Cancelled => Some("cancelled"),
    };
    if let Some(marker) = marker {
        line.push_str(" (");
        line.push_str(&paint(Style::new().yellow().bold(), marker, color));
        line.push(')');
    }
    line
}

fn paint(st: Style, text: impl std::fmt::Display, color: bool) -> String {
    if color {
        st.force_styling(true).apply_to(text).to_string()
    } else {
        text.to_string()
    }
}
