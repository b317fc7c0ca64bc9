use crate::config::WalkConfig;
use crate::error::ScanError;
use crate::item::WorkItem;
use crate::results::ScanResult;

/// A producer of work items: the walker half of the pipeline.
///
/// Implement this to feed fanscan from anything traversable. The crate ships
/// [`DirSource`](crate::DirSource) for directory trees and
/// [`ListingSource`](crate::ListingSource) for checksum listings.
///
/// # Object Safety
///
/// `Source` is object-safe. The builder stores sources as `Box<dyn Source>`,
/// so `walk()` returns a boxed iterator rather than `impl Iterator`.
///
/// # Thread Safety
///
/// The engine drives `walk()` on its own thread while workers run, so
/// sources must be `Send + Sync`. The returned iterator is consumed on that
/// same thread and need not be `Send`.
///
/// # Stopping
///
/// A source that filters entries internally should call
/// `config.stop.check()` for every entry it visits and end the iterator
/// once it returns `Some`. The engine only sees the items that are yielded,
/// so without this a walk that filters everything out cannot be cut short
/// by a timeout or a cancel.
///
/// # Error Handling
///
/// Yield `Err` for problems with a single entry. Errors for which
/// [`ScanError::is_recoverable`] is true are logged and counted and the walk
/// continues; any other error stops the walk and fails the scan once the
/// in-flight items have drained.
///
/// # Example
///
/// ```rust
/// use fanscan::{Source, WorkItem, ScanError, WalkConfig};
///
/// struct VecSource(Vec<String>);
///
/// impl Source for VecSource {
///     fn walk(&self, _config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
///         Box::new(self.0.iter().map(|p| Ok(WorkItem::content(p))))
///     }
/// }
/// ```
pub trait Source: Send + Sync {
    /// Traverse the source and yield work items.
    fn walk(&self, config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_>;

    /// Number of entries filtered out during the last `walk()`.
    fn skipped(&self) -> usize {
        0
    }
}

/// The per-item operation run by every worker in the pool.
///
/// # Thread Safety
///
/// One processor instance is shared by all workers and called concurrently
/// on different items, so it must be `Send + Sync` and must not rely on
/// interior locking.
///
/// # Contract
///
/// `process` never panics on I/O trouble: open and read failures are
/// returned as [`Outcome::Error`](crate::Outcome::Error) results so that one
/// bad file never takes down the pool. A processor may return zero results
/// for an item (a pattern scan with no matching line, a binary file) or
/// several (one per matching line).
///
/// # Example
///
/// ```rust
/// use fanscan::{Processor, WorkItem, ScanResult, Outcome};
///
/// struct NonEmpty;
///
/// impl Processor for NonEmpty {
///     fn process(&self, item: WorkItem) -> Vec<ScanResult> {
///         let outcome = match std::fs::metadata(&item.path) {
///             Ok(m) if m.len() > 0 => Outcome::Matched,
///             Ok(_)                => Outcome::NotMatched,
///             Err(e)               => Outcome::Error(e.to_string()),
///         };
///         vec![ScanResult::new(item.path, outcome, "")]
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    fn process(&self, item: WorkItem) -> Vec<ScanResult>;
}
