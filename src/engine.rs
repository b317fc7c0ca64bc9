use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::cancel::{CancelToken, Deadline, StopSignal};
use crate::config::{PipelineConfig, WalkConfig};
use crate::error::ScanError;
use crate::item::WorkItem;
use crate::results::{sort_results, Outcome, Report, ScanResult, ScanStats, Termination};
use crate::shutdown::{Coordinator, Phase};
use crate::traits::{Processor, Source};

/// How long the walker waits on a full queue before re-checking the cancel
/// token and the deadline.
const BACKPRESSURE_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Engine options
// ---------------------------------------------------------------------------

/// Everything one pipeline run needs. Borrowed for the duration of `run()`.
pub struct EngineOptions<'a> {
    pub config:              &'a PipelineConfig,
    pub source:              &'a dyn Source,
    pub processor:           &'a dyn Processor,
    pub cancel:              CancelToken,
    pub collect_walk_errors: bool,
}

// ---------------------------------------------------------------------------
// Shared counters
// ---------------------------------------------------------------------------

/// Cross-thread counters. Workers only ever `fetch_add`.
#[derive(Default)]
struct Counters {
    files_scanned: AtomicUsize,
    matches:       AtomicUsize,
    errors:        AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Matched    => { self.matches.fetch_add(1, Ordering::Relaxed); }
            Outcome::Error(_)   => { self.errors.fetch_add(1, Ordering::Relaxed); }
            Outcome::NotMatched => {}
        }
    }
}

/// What the walker reports back once it has closed the work queue.
struct WalkSummary {
    termination: Termination,
    fatal:       Option<ScanError>,
    errors:      Vec<ScanError>,
    error_count: usize,
    enqueued:    usize,
}

enum SendStop {
    Halted(Termination),
    Disconnected,
}

// ---------------------------------------------------------------------------
// run()
// ---------------------------------------------------------------------------

/// Execute one bounded pipeline run.
///
/// The collector starts first, then `config.workers` workers, then the
/// walker runs on the calling thread. Each worker owns one clone of the
/// result sender and the engine drops its own copy right after spawning, so
/// the result queue closes exactly when the last worker exits. That is the
/// whole shutdown protocol: worker lifetimes, not item counts, decide when
/// collection ends.
///
/// Returns `Err` for a non-recoverable walk error or a panicked worker,
/// after the pool has drained. A timeout or cancellation is not an error:
/// the report carries the partial, sorted results and a
/// [`Termination`] marker.
pub fn run(opts: EngineOptions<'_>) -> Result<Report, ScanError> {
    let config      = opts.config;
    let workers     = config.workers.max(1);
    let capacity    = config.queue_capacity.max(1);
    let stop        = StopSignal::new(opts.cancel.clone(), Deadline::after(config.timeout));
    let counters    = Counters::default();
    let coordinator = Coordinator::new();
    let start       = Instant::now();

    info!(
        workers,
        queue_capacity = capacity,
        timeout = ?config.timeout,
        "starting scan"
    );

    let (summary, results, panicked) = thread::scope(|s| -> Result<_, ScanError> {
        let (work_tx, work_rx)     = bounded::<WorkItem>(capacity);
        let (result_tx, result_rx) = bounded::<ScanResult>(capacity);

        // Collector before workers: a full result queue must always have a
        // reader.
        let collector = thread::Builder::new()
            .name("fanscan-collector".into())
            .spawn_scoped(s, move || collect(result_rx))
            .map_err(|e| ScanError::Source(format!("failed to spawn collector: {e}")))?;

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx        = work_rx.clone();
            let tx        = result_tx.clone();
            let processor = opts.processor;
            let counters  = &counters;

            let handle = thread::Builder::new()
                .name(format!("fanscan-worker-{id}"))
                .spawn_scoped(s, move || worker_loop(id, rx, tx, processor, counters))
                .map_err(|e| ScanError::Source(format!("failed to spawn worker {id}: {e}")))?;
            handles.push(handle);
        }
        drop(work_rx);
        drop(result_tx);

        let mut walk_config = config.walk.clone();
        walk_config.stop = stop.clone();
        let summary = walk(opts.source, &walk_config, work_tx, opts.collect_walk_errors);
        coordinator.advance(Phase::WalkDone)?;

        let mut panicked = false;
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
                panicked = true;
            }
        }
        coordinator.advance(Phase::WorkersDone)?;

        let results = collector.join().map_err(|_| ScanError::CollectorPanicked)?;
        coordinator.advance(Phase::CollectionDone)?;

        Ok((summary, results, panicked))
    })?;

    let stats = ScanStats {
        files_scanned: counters.files_scanned.load(Ordering::Relaxed),
        matches:       counters.matches.load(Ordering::Relaxed),
        errors:        counters.errors.load(Ordering::Relaxed),
        skipped:       opts.source.skipped(),
        walk_errors:   summary.error_count,
        workers,
        duration:      start.elapsed(),
    };

    if !panicked && stats.files_scanned != summary.enqueued {
        return Err(ScanError::Shutdown(format!(
            "{} items enqueued but {} processed",
            summary.enqueued, stats.files_scanned
        )));
    }

    info!(
        files = stats.files_scanned,
        matches = stats.matches,
        errors = stats.errors,
        skipped = stats.skipped,
        termination = ?summary.termination,
        duration_ms = stats.duration.as_millis() as u64,
        "scan finished"
    );

    if let Some(fatal) = summary.fatal {
        return Err(fatal);
    }
    if panicked {
        return Err(ScanError::WorkerPanicked);
    }

    coordinator.advance(Phase::Terminal)?;

    Ok(Report {
        results,
        stats,
        termination: summary.termination,
        walk_errors: summary.errors,
    })
}

// ---------------------------------------------------------------------------
// Walker side
// ---------------------------------------------------------------------------

/// Drive the source, feeding the bounded queue. Dropping `tx` on return is
/// the only "no more work" signal the pool gets.
///
/// `config.stop` is checked here between items and by the source between
/// raw entries; whichever side trips it first, the latched reason ends up
/// in the summary.
fn walk(
    source: &dyn Source,
    config: &WalkConfig,
    tx: Sender<WorkItem>,
    collect_errors: bool,
) -> WalkSummary {
    let stop = &config.stop;
    let mut summary = WalkSummary {
        termination: Termination::Completed,
        fatal:       None,
        errors:      Vec::new(),
        error_count: 0,
        enqueued:    0,
    };

    for res in source.walk(config) {
        if let Some(t) = stop.check() {
            summary.termination = t;
            break;
        }

        match res {
            Ok(item) => match send_with_backpressure(&tx, item, stop) {
                Ok(()) => summary.enqueued += 1,
                Err(SendStop::Halted(t)) => {
                    summary.termination = t;
                    break;
                }
                Err(SendStop::Disconnected) => {
                    summary.fatal = Some(ScanError::Shutdown(
                        "work queue closed before the walk finished".into(),
                    ));
                    break;
                }
            },
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "skipping");
                summary.error_count += 1;
                if collect_errors {
                    summary.errors.push(e);
                }
            }
            Err(e) => {
                error!(error = %e, "walk aborted");
                summary.fatal = Some(e);
                break;
            }
        }
    }

    if summary.fatal.is_none() {
        if let Some(t) = stop.fired() {
            summary.termination = t;
        }
    }

    match summary.termination {
        Termination::TimedOut  => warn!("deadline exceeded, draining in-flight work"),
        Termination::Cancelled => warn!("cancelled, draining in-flight work"),
        Termination::Completed => debug!(enqueued = summary.enqueued, "walk complete"),
    }

    drop(tx);
    summary
}

/// Block until the queue accepts `item`, waking up periodically so a
/// deadline or cancellation is noticed even while every worker is busy.
fn send_with_backpressure(
    tx: &Sender<WorkItem>,
    mut item: WorkItem,
    stop: &StopSignal,
) -> Result<(), SendStop> {
    loop {
        match tx.send_timeout(item, BACKPRESSURE_POLL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(back)) => {
                if let Some(t) = stop.check() {
                    return Err(SendStop::Halted(t));
                }
                trace!("work queue full");
                item = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(SendStop::Disconnected),
        }
    }
}

// ---------------------------------------------------------------------------
// Pool and collector
// ---------------------------------------------------------------------------

/// Pull items until the work queue is closed and drained.
fn worker_loop(
    id: usize,
    rx: Receiver<WorkItem>,
    tx: Sender<ScanResult>,
    processor: &dyn Processor,
    counters: &Counters,
) {
    trace!(worker = id, "worker started");

    for item in rx.iter() {
        counters.files_scanned.fetch_add(1, Ordering::Relaxed);
        for result in processor.process(item) {
            counters.record(&result.outcome);
            if tx.send(result).is_err() {
                error!(worker = id, "result queue closed under a running worker");
                return;
            }
        }
    }

    trace!(worker = id, "worker exiting");
}

fn collect(rx: Receiver<ScanResult>) -> Vec<ScanResult> {
    let mut results: Vec<ScanResult> = rx.iter().collect();
    debug!(results = results.len(), "result queue closed");
    sort_results(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Target;
    use std::path::PathBuf;

    struct Items(Vec<PathBuf>);

    impl Source for Items {
        fn walk(&self, _config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
            Box::new(self.0.iter().map(|p| Ok(WorkItem::content(p))))
        }
    }

    /// Emits one match per item without touching the filesystem.
    struct Echo;

    impl Processor for Echo {
        fn process(&self, item: WorkItem) -> Vec<ScanResult> {
            assert_eq!(item.target, Target::Content);
            vec![ScanResult::new(item.path, Outcome::Matched, "")]
        }
    }

    /// Sleeps per item so the queue stays full.
    struct Slow(Duration);

    impl Processor for Slow {
        fn process(&self, item: WorkItem) -> Vec<ScanResult> {
            thread::sleep(self.0);
            vec![ScanResult::new(item.path, Outcome::NotMatched, "")]
        }
    }

    fn config(workers: usize, capacity: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            queue_capacity: capacity,
            timeout: None,
            walk: WalkConfig::default(),
        }
    }

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("f{i:04}"))).collect()
    }

    #[test]
    fn empty_source_terminates_cleanly() {
        let cfg = config(4, 2);
        let report = run(EngineOptions {
            config: &cfg,
            source: &Items(Vec::new()),
            processor: &Echo,
            cancel: CancelToken::new(),
            collect_walk_errors: false,
        })
        .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.stats.files_scanned, 0);
        assert_eq!(report.stats.matches, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn capacity_one_single_worker_does_not_deadlock() {
        let cfg = config(1, 1);
        let report = run(EngineOptions {
            config: &cfg,
            source: &Items(paths(200)),
            processor: &Echo,
            cancel: CancelToken::new(),
            collect_walk_errors: false,
        })
        .unwrap();

        assert_eq!(report.results.len(), 200);
        assert_eq!(report.stats.files_scanned, 200);
        assert_eq!(report.stats.matches, 200);
    }

    #[test]
    fn cancelled_before_start_enqueues_nothing() {
        let cfg = config(2, 2);
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = run(EngineOptions {
            config: &cfg,
            source: &Items(paths(10)),
            processor: &Echo,
            cancel,
            collect_walk_errors: false,
        })
        .unwrap();

        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.stats.files_scanned, 0);
    }

    #[test]
    fn timeout_drains_in_flight_work() {
        let mut cfg = config(1, 1);
        cfg.timeout = Some(Duration::from_millis(100));

        let report = run(EngineOptions {
            config: &cfg,
            source: &Items(paths(1_000)),
            processor: &Slow(Duration::from_millis(20)),
            cancel: CancelToken::new(),
            collect_walk_errors: false,
        })
        .unwrap();

        assert!(report.timed_out());
        assert!(report.stats.files_scanned < 1_000);
        assert_eq!(report.results.len(), report.stats.files_scanned);
        let mut sorted = report.results.clone();
        sort_results(&mut sorted);
        assert_eq!(sorted, report.results);
    }

    #[test]
    fn stop_tripped_inside_a_silent_source_is_reported() {
        /// Visits `n` entries and filters all of them out, checking the
        /// stop signal per entry the way `DirSource` does.
        struct RejectAll(usize);
        impl Source for RejectAll {
            fn walk(&self, config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
                let stop = config.stop.clone();
                Box::new(
                    (0..self.0)
                        .take_while(move |_| stop.check().is_none())
                        .filter_map(|_| None::<Result<WorkItem, ScanError>>),
                )
            }
        }

        let cancel = CancelToken::new();
        cancel.cancel();
        let cfg = config(2, 2);
        let report = run(EngineOptions {
            config: &cfg,
            source: &RejectAll(1_000),
            processor: &Echo,
            cancel,
            collect_walk_errors: false,
        })
        .unwrap();
        assert_eq!(report.termination, Termination::Cancelled);

        let mut cfg = config(2, 2);
        cfg.timeout = Some(Duration::from_nanos(1));
        let report = run(EngineOptions {
            config: &cfg,
            source: &RejectAll(usize::MAX),
            processor: &Echo,
            cancel: CancelToken::new(),
            collect_walk_errors: false,
        })
        .unwrap();
        assert!(report.timed_out());
        assert_eq!(report.stats.files_scanned, 0);
    }

    #[test]
    fn fatal_source_error_fails_after_draining() {
        struct Broken;
        impl Source for Broken {
            fn walk(&self, _config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
                Box::new(
                    vec![
                        Ok(WorkItem::content("a")),
                        Err(ScanError::PermissionDenied("locked".into())),
                        Err(ScanError::Source("device vanished".into())),
                        Ok(WorkItem::content("never")),
                    ]
                    .into_iter(),
                )
            }
        }

        let cfg = config(2, 2);
        let err = run(EngineOptions {
            config: &cfg,
            source: &Broken,
            processor: &Echo,
            cancel: CancelToken::new(),
            collect_walk_errors: true,
        })
        .err()
        .unwrap();

        assert!(matches!(err, ScanError::Source(_)));
    }

    #[test]
    fn recoverable_errors_are_counted_and_collected() {
        struct Patchy;
        impl Source for Patchy {
            fn walk(&self, _config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
                Box::new(
                    vec![
                        Ok(WorkItem::content("a")),
                        Err(ScanError::PermissionDenied("locked".into())),
                        Ok(WorkItem::content("b")),
                    ]
                    .into_iter(),
                )
            }
        }

        let cfg = config(2, 2);
        let report = run(EngineOptions {
            config: &cfg,
            source: &Patchy,
            processor: &Echo,
            cancel: CancelToken::new(),
            collect_walk_errors: true,
        })
        .unwrap();

        assert_eq!(report.stats.files_scanned, 2);
        assert_eq!(report.stats.walk_errors, 1);
        assert_eq!(report.walk_errors.len(), 1);
    }
}
