//! # fanscan
//!
//! Bounded concurrent file scanning: one walker, one fixed worker pool, one
//! collector.
//!
//! fanscan owns the pipeline: the bounded work queue, the worker pool, the
//! ordered result collection and the shutdown protocol. What gets walked and
//! what each worker does are injected through two traits, [`Source`] and
//! [`Processor`]. The crate ships the usual suspects:
//!
//! - [`DirSource`] walks a directory tree, skipping VCS/vendor directories,
//!   other devices, oversized and non-regular files.
//! - [`ListingSource`] reads a `sha256sum`-style checksum listing.
//! - [`PatternScan`] greps files line by line, skipping binaries.
//! - [`HashCompare`] hashes files and compares them with an expected digest,
//!   picking md5/sha1/sha256/sha384/sha512 from the digest length.
//!
//! Results come back sorted by path (case-insensitive) and line, whatever
//! order the workers finished in.
//!
//! # Quick Start
//!
//! ```rust
//! use fanscan::{Source, Processor, WorkItem, ScanResult, Outcome, ScanError, WalkConfig};
//!
//! // A minimal in-memory source for demonstration
//! struct Names(Vec<&'static str>);
//!
//! impl Source for Names {
//!     fn walk(&self, _config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
//!         Box::new(self.0.iter().map(|n| Ok(WorkItem::content(n))))
//!     }
//! }
//!
//! // Matches on the file name alone
//! struct Invoices;
//!
//! impl Processor for Invoices {
//!     fn process(&self, item: WorkItem) -> Vec<ScanResult> {
//!         let hit = item.path.to_string_lossy().contains("invoice");
//!         let outcome = if hit { Outcome::Matched } else { Outcome::NotMatched };
//!         vec![ScanResult::new(item.path, outcome, "")]
//!     }
//! }
//!
//! let report = fanscan::scan()
//!     .source(Names(vec!["invoice_jan.txt", "report.txt", "invoice_feb.txt"]))
//!     .processor(Invoices)
//!     .workers(4)
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(report.stats.matches, 2);
//! assert_eq!(report.results[0].path.to_string_lossy(), "invoice_feb.txt");
//! println!("Scanned {} files in {:.3}s",
//!     report.stats.files_scanned,
//!     report.stats.duration.as_secs_f64()
//! );
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod hash;
pub mod render;
pub mod shutdown;

mod builder;
mod cancel;
mod error;
mod filter;
mod item;
mod listing;
mod pattern;
mod results;
mod traits;
mod walker;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::ScanBuilder;
pub use cancel::{CancelToken, Deadline, StopSignal};
pub use config::{PipelineConfig, WalkConfig};
pub use error::ScanError;
pub use filter::NameFilter;
pub use hash::{match_or_no_match, HashAlgorithm, HashCompare};
pub use item::{Target, WorkItem};
pub use listing::{parse_entry, ListingEntry, ListingSource};
pub use pattern::PatternScan;
pub use results::{sort_results, Outcome, Report, ScanResult, ScanStats, Termination};
pub use traits::{Processor, Source};
pub use walker::DirSource;

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`ScanBuilder`] to configure and run a scan.
///
/// # Example
///
/// ```rust,no_run
/// use fanscan::{DirSource, PatternScan};
///
/// let report = fanscan::scan()
///     .source(DirSource::new(".")?)
///     .processor(PatternScan::new("TODO", None, false)?)
///     .run()?;
///
/// for hit in report.matches() {
///     println!("{}:{}:{}", hit.path.display(), hit.line.unwrap_or(0), hit.detail);
/// }
/// # Ok::<(), fanscan::ScanError>(())
/// ```
pub fn scan() -> ScanBuilder {
    ScanBuilder::default()
}
