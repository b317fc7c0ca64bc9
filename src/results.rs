use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScanError;

/// Outcome of processing one work item (or one line of it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    NotMatched,
    /// The item could not be processed. Carries a human-readable reason.
    Error(String),
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A single result emitted by a worker.
///
/// Immutable after creation; ownership passes to the collector through the
/// result queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// File the result refers to.
    pub path: PathBuf,

    /// 1-based line number for pattern scans, `None` for whole-file results.
    pub line: Option<u64>,

    pub outcome: Outcome,

    /// Matched line text for pattern scans, the algorithm name for hash
    /// comparisons, empty otherwise.
    pub detail: String,
}

impl ScanResult {
    pub fn new(path: impl Into<PathBuf>, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            outcome,
            detail: detail.into(),
        }
    }

    pub fn line_match(path: impl Into<PathBuf>, line: u64, text: impl Into<String>) -> Self {
        Self {
            path:    path.into(),
            line:    Some(line),
            outcome: Outcome::Matched,
            detail:  text.into(),
        }
    }

    pub fn error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::new(path, Outcome::Error(reason.into()), String::new())
    }
}

/// Sort results into the canonical output order.
///
/// Paths compare case-insensitively first; the raw path breaks ties so that
/// `A.txt` and `a.txt` still land in a fixed order. Whole-file results sort
/// before line results of the same file.
pub fn sort_results(results: &mut [ScanResult]) {
    results.sort_by(compare_results);
}

fn compare_results(a: &ScanResult, b: &ScanResult) -> Ordering {
    let pa = a.path.to_string_lossy();
    let pb = b.path.to_string_lossy();
    pa.to_lowercase()
        .cmp(&pb.to_lowercase())
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.line.cmp(&b.line))
        .then_with(|| a.detail.cmp(&b.detail))
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The walk visited everything and every queued item was processed.
    Completed,

    /// The wall-clock deadline expired; the walk stopped early and in-flight
    /// items were drained.
    TimedOut,

    /// The cancel token fired (Ctrl-C).
    Cancelled,
}

impl Termination {
    /// Process exit status for a run that ended this way: `0` only for a
    /// completed run, whether or not anything matched.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Completed                  => 0,
            Self::TimedOut | Self::Cancelled => 1,
        }
    }
}

/// The output of a finished scan.
pub struct Report {
    /// Every result, sorted by [`sort_results`].
    pub results: Vec<ScanResult>,

    pub stats: ScanStats,

    pub termination: Termination,

    /// Recoverable walk errors (unreadable subdirectories, malformed listing
    /// lines). Only populated if `.collect_walk_errors(true)` was set on the
    /// builder; they are always counted in [`ScanStats::walk_errors`].
    pub walk_errors: Vec<ScanError>,
}

impl Report {
    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }

    pub fn matches(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|r| r.outcome.is_match())
    }
}

/// Counters for a finished scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Work items dequeued and processed by the pool.
    pub files_scanned: usize,

    /// Results with [`Outcome::Matched`].
    pub matches: usize,

    /// Results with [`Outcome::Error`].
    pub errors: usize,

    /// Entries the walker filtered out (size, device, name, file type).
    pub skipped: usize,

    /// Recoverable traversal errors.
    pub walk_errors: usize,

    /// Pool size actually used.
    pub workers: usize,

    /// Wall-clock time from scan start to collection done.
    pub duration: Duration,
}
