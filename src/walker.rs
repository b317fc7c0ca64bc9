//! Directory walker
//!
//! Depth-first traversal of one start path. Skip rules are evaluated in a
//! fixed order:
//!
//! 1. directory name contains a deny-list fragment → skip the subtree
//! 2. directory lives on another device than the root → skip the subtree
//! 3. file larger than the size ceiling → skip the file
//! 4. not a regular file (symlinks included) → skip
//!
//! Surviving files are then checked against the name filter.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};
use tracing::{debug, trace};

use crate::config::WalkConfig;
use crate::error::ScanError;
use crate::item::WorkItem;
use crate::traits::Source;

/// Walks a directory tree (or yields a single file) as content work items.
pub struct DirSource {
    root:     PathBuf,
    root_dev: Option<u64>,
    skipped:  Arc<AtomicUsize>,
}

impl DirSource {
    /// Validate `root` and prepare a walker for it.
    ///
    /// A missing, unreadable or special-file root is fatal here, before any
    /// scanning starts.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|e| ScanError::io(&root, e))?;

        if meta.is_dir() {
            fs::read_dir(&root).map_err(|e| ScanError::io(&root, e))?;
        } else if !meta.is_file() {
            return Err(ScanError::InvalidSource(root));
        }

        Ok(Self {
            root_dev: device_id(&meta),
            root,
            skipped: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn build(&self, config: &WalkConfig) -> ignore::Walk {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .ignore(false)
            .parents(false)
            .hidden(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        if let Some(depth) = config.max_depth {
            builder.max_depth(Some(depth));
        }

        let rules    = config.clone();
        let root_dev = self.root_dev;
        let skipped  = Arc::clone(&self.skipped);

        builder.filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }

            if rules.is_skipped_dir(&entry.file_name().to_string_lossy()) {
                trace!(path = %entry.path().display(), "deny-listed directory, skipped");
                skipped.fetch_add(1, Ordering::Relaxed);
                return false;
            }

            if root_dev.is_some() {
                let dev = entry.metadata().ok().and_then(|m| device_id(&m));
                if crosses_device(root_dev, dev) {
                    debug!(path = %entry.path().display(), "different device, skipped");
                    skipped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }

            true
        });

        builder.build()
    }

    /// Turn one walk entry into a work item, or `None` when it is filtered.
    fn admit(&self, entry: DirEntry, config: &WalkConfig) -> Option<Result<WorkItem, ScanError>> {
        let ft = entry.file_type()?;
        if ft.is_dir() {
            return None;
        }

        if let Some(max) = config.max_file_size {
            let meta = match entry.metadata() {
                Ok(m)  => m,
                Err(e) => return Some(Err(map_ignore_error(e))),
            };
            if meta.len() > max {
                trace!(path = %entry.path().display(), size = meta.len(), "oversized, skipped");
                return self.skip();
            }
        }

        if !ft.is_file() {
            trace!(path = %entry.path().display(), "not a regular file, skipped");
            return self.skip();
        }

        let name = entry.file_name().to_string_lossy();
        if !config.name_filter.is_match(&name) {
            return self.skip();
        }

        Some(Ok(WorkItem::content(entry.into_path())))
    }

    fn skip(&self) -> Option<Result<WorkItem, ScanError>> {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        None
    }
}

impl Source for DirSource {
    fn walk(&self, config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
        self.skipped.store(0, Ordering::Relaxed);
        let config = config.clone();
        let stop   = config.stop.clone();
        let walk   = self.build(&config);

        // Checked per raw entry: filtered entries never reach the engine.
        Box::new(
            walk.take_while(move |_| stop.check().is_none())
                .filter_map(move |res| match res {
                    Ok(entry) => self.admit(entry, &config),
                    Err(e)    => Some(Err(map_ignore_error(e))),
                }),
        )
    }

    fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn device_id(meta: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.dev())
}

#[cfg(not(unix))]
fn device_id(_meta: &fs::Metadata) -> Option<u64> {
    None
}

/// True when both devices are known and differ. An unknown device id on
/// either side never prunes.
fn crosses_device(root: Option<u64>, entry: Option<u64>) -> bool {
    matches!((root, entry), (Some(r), Some(e)) if r != e)
}

/// Map an `ignore::Error` to a `ScanError`.
///
/// Failures at depth 0 concern the root itself and are made fatal.
fn map_ignore_error(e: ignore::Error) -> ScanError {
    let at_root = error_depth(&e) == Some(0);
    let mapped = flatten_ignore_error(e, None);
    match (at_root, mapped.path().cloned()) {
        (true, Some(path)) => ScanError::InvalidSource(path),
        _                  => mapped,
    }
}

fn error_depth(e: &ignore::Error) -> Option<usize> {
    match e {
        ignore::Error::WithDepth { depth, .. } => Some(*depth),
        ignore::Error::WithPath { err, .. }    => error_depth(err),
        _                                      => None,
    }
}

fn flatten_ignore_error(e: ignore::Error, path: Option<PathBuf>) -> ScanError {
    match e {
        ignore::Error::WithPath { path, err }   => flatten_ignore_error(*err, Some(path)),
        ignore::Error::WithDepth { err, .. }    => flatten_ignore_error(*err, path),
        ignore::Error::WithLineNumber { err, .. } => flatten_ignore_error(*err, path),
        ignore::Error::Loop { child, .. }       => ScanError::SymlinkLoop(child),
        ignore::Error::Io(io_err)               => ScanError::io(path.unwrap_or_default(), io_err),
        other                                   => ScanError::Source(other.to_string()),
    }
}
