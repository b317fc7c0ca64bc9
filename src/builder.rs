use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::{
    default_workers, PipelineConfig, WalkConfig, DEFAULT_MULTIPLIER, MAX_TIMEOUT_SECS, MAX_WORKERS,
    QUEUE_SLOTS_PER_WORKER,
};
use crate::engine::{run, EngineOptions};
use crate::error::ScanError;
use crate::filter::NameFilter;
use crate::results::Report;
use crate::traits::{Processor, Source};

// ---------------------------------------------------------------------------
// ScanBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring and executing a scan.
///
/// Created via [`fanscan::scan()`](crate::scan). Configure with chained
/// builder methods, then call [`run()`](ScanBuilder::run) to execute.
///
/// # Example
///
/// ```rust,ignore
/// let report = fanscan::scan()
///     .source(DirSource::new("src")?)
///     .processor(PatternScan::new("unsafe", None, false)?)
///     .workers(8)
///     .timeout(Duration::from_secs(30))
///     .run()?;
/// ```
pub struct ScanBuilder {
    source:              Option<Box<dyn Source>>,
    processor:           Option<Box<dyn Processor>>,
    workers:             Option<usize>,
    multiplier:          usize,
    queue_capacity:      Option<usize>,
    timeout:             Option<Duration>,
    walk:                WalkConfig,
    cancel:              CancelToken,
    collect_walk_errors: bool,
}

impl Default for ScanBuilder {
    fn default() -> Self {
        Self {
            source:              None,
            processor:           None,
            workers:             None,
            multiplier:          DEFAULT_MULTIPLIER,
            queue_capacity:      None,
            timeout:             None,
            walk:                WalkConfig::default(),
            cancel:              CancelToken::new(),
            collect_walk_errors: false,
        }
    }
}

impl ScanBuilder {
    // ── Pipeline ends ─────────────────────────────────────────────────────

    /// Set the source of work items.
    ///
    /// [`DirSource`](crate::DirSource) walks a directory tree,
    /// [`ListingSource`](crate::ListingSource) reads a checksum listing. Any
    /// other [`Source`] works too.
    pub fn source(mut self, s: impl Source + 'static) -> Self {
        self.source = Some(Box::new(s));
        self
    }

    /// Set the per-item operation run by the worker pool.
    pub fn processor(mut self, p: impl Processor + 'static) -> Self {
        self.processor = Some(Box::new(p));
        self
    }

    // ── Pool ──────────────────────────────────────────────────────────────

    /// Fixed pool size. Overrides [`multiplier`](Self::multiplier).
    /// `0` is clamped to `1`.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    /// Workers per logical CPU when no fixed size is given. Defaults to 2.
    pub fn multiplier(mut self, m: usize) -> Self {
        self.multiplier = m;
        self
    }

    /// Work-queue capacity. Defaults to four slots per worker. The walker
    /// blocks once the queue is full.
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = Some(n);
        self
    }

    /// Stop walking after this long and report partial results.
    /// At most 300 seconds.
    pub fn timeout(mut self, t: Duration) -> Self {
        self.timeout = Some(t);
        self
    }

    /// Token that stops the walk when cancelled from another thread.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    // ── Walk ──────────────────────────────────────────────────────────────

    /// Maximum traversal depth. `0` means the root only, `1` means one
    /// level of children, and so on. Unlimited by default.
    pub fn max_depth(mut self, d: usize) -> Self {
        self.walk.max_depth = Some(d);
        self
    }

    /// Skip files larger than `bytes`.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.walk.max_file_size = Some(bytes);
        self
    }

    /// Replace the directory deny-list.
    pub fn skip_dirs<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.walk.skip_dirs = fragments.into_iter().map(Into::into).collect();
        self
    }

    pub fn name_filter(mut self, filter: NameFilter) -> Self {
        self.walk.name_filter = filter;
        self
    }

    /// Use a fully prepared configuration instead of the individual setters.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.workers        = Some(config.workers);
        self.queue_capacity = Some(config.queue_capacity);
        self.timeout        = config.timeout;
        self.walk           = config.walk;
        self
    }

    /// Keep recoverable walk errors in [`Report::walk_errors`].
    ///
    /// Disabled by default; they are always logged and counted.
    pub fn collect_walk_errors(mut self, yes: bool) -> Self {
        self.collect_walk_errors = yes;
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Execute the scan and return the sorted report.
    ///
    /// Blocks until the walk ends and the pool has drained.
    ///
    /// # Errors
    ///
    /// Returns `Err` for configuration problems (no source, no processor,
    /// timeout or pool size out of range), a non-recoverable walk error, or
    /// a panicked worker. A timeout is reported through
    /// [`Report::termination`], not as an error.
    pub fn run(self) -> Result<Report, ScanError> {
        let source = self.source.ok_or_else(|| {
            ScanError::InvalidSource("no source provided".into())
        })?;
        let processor = self.processor.ok_or_else(|| {
            ScanError::InvalidConfig("no processor provided".into())
        })?;

        if self.multiplier == 0 {
            return Err(ScanError::InvalidConfig("multiplier must be at least 1".into()));
        }
        let workers = match self.workers {
            Some(n) if n > MAX_WORKERS => return Err(ScanError::InvalidThreadCount(n)),
            Some(n) => n.max(1),
            None    => default_workers(self.multiplier),
        };

        if let Some(t) = self.timeout {
            if t > Duration::from_secs(MAX_TIMEOUT_SECS) {
                return Err(ScanError::InvalidConfig(format!(
                    "timeout of {}s exceeds the maximum of {MAX_TIMEOUT_SECS}s",
                    t.as_secs()
                )));
            }
        }

        let config = PipelineConfig {
            workers,
            queue_capacity: self
                .queue_capacity
                .unwrap_or(workers * QUEUE_SLOTS_PER_WORKER)
                .max(1),
            timeout: self.timeout,
            walk:    self.walk,
        };

        run(EngineOptions {
            config:              &config,
            source:              source.as_ref(),
            processor:           processor.as_ref(),
            cancel:              self.cancel,
            collect_walk_errors: self.collect_walk_errors,
        })
    }
}
