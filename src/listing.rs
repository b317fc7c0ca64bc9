//! Checksum listings as a work source
//!
//! Accepts the usual `sha256sum`-style files as well as the reversed
//! `filename hash` layout:
//!
//! ```text
//! # comment
//! ; also a comment
//! ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad  abc.txt
//! 900150983cd24fb0d6963f7d28e17f72 *abc.bin
//! notes final.txt a9993e364706816aba3e25717850c26c9cd0d89d
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::WalkConfig;
use crate::error::ScanError;
use crate::hash::looks_like_digest;
use crate::item::WorkItem;
use crate::traits::Source;

/// One parsed listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub digest:   String,
    pub filename: String,
}

/// Reads a checksum listing and yields one digest work item per entry.
pub struct ListingSource {
    path:     PathBuf,
    base_dir: PathBuf,
    text:     String,
}

impl ListingSource {
    /// Load the listing at `path`. An unreadable listing is fatal.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let path = path.into();
        let bytes = fs::read(&path).map_err(|e| ScanError::io(&path, e))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            base_dir,
            path,
        })
    }

    fn resolve(&self, filename: &str) -> PathBuf {
        let p = Path::new(filename);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

impl Source for ListingSource {
    fn walk(&self, config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
        let stop = config.stop.clone();
        Box::new(
            self.text
                .lines()
                .enumerate()
                .take_while(move |_| stop.check().is_none())
                .filter_map(move |(idx, line)| match parse_entry(line)? {
                    Ok(entry) => Some(Ok(WorkItem::digest(self.resolve(&entry.filename), entry.digest))),
                    Err(reason) => Some(Err(ScanError::Listing {
                        path: self.path.clone(),
                        line: idx + 1,
                        reason,
                    })),
                }),
        )
    }
}

/// Parse a single listing line.
///
/// Returns `None` for blank lines and comments, `Some(Err(_))` for lines
/// without a recognizable digest.
pub fn parse_entry(line: &str) -> Option<Result<ListingEntry, String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return None;
    }

    let first = line.split_whitespace().next().unwrap_or_default();
    let last  = line.split_whitespace().next_back().unwrap_or_default();

    let (digest, filename) = if looks_like_digest(first) {
        (first, line[first.len()..].trim_start())
    } else if looks_like_digest(last) {
        (last, line[..line.len() - last.len()].trim_end())
    } else {
        return Some(Err(format!("no recognizable digest in {line:?}")));
    };

    let filename = filename.strip_prefix('*').unwrap_or(filename);
    if filename.is_empty() {
        return Some(Err("digest without a filename".to_string()));
    }

    Some(Ok(ListingEntry {
        digest:   digest.to_string(),
        filename: filename.to_string(),
    }))
}
