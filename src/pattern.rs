use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::ScanError;
use crate::item::WorkItem;
use crate::results::ScanResult;
use crate::traits::Processor;

const READ_CHUNK: usize = 64 * 1024;

/// Line-oriented regex scan.
///
/// A line is reported when it matches `pattern` and does not match
/// `exclude`. Files containing a NUL byte are treated as binary and
/// contribute nothing, even for lines seen before the NUL. Input is read
/// in fixed-size chunks and each chunk is checked for NUL before it is
/// buffered, so a binary file is abandoned after at most one chunk past the
/// NUL rather than after its first newline.
#[derive(Debug, Clone)]
pub struct PatternScan {
    pattern: Regex,
    exclude: Option<Regex>,
}

/// Why a file scan stopped early.
enum Stop {
    Binary,
    Io(io::Error),
}

impl PatternScan {
    pub fn new(pattern: &str, exclude: Option<&str>, ignore_case: bool) -> Result<Self, ScanError> {
        Ok(Self {
            pattern: compile(pattern, ignore_case)?,
            exclude: exclude.map(|x| compile(x, ignore_case)).transpose()?,
        })
    }

    fn is_hit(&self, line: &str) -> bool {
        self.pattern.is_match(line)
            && !self.exclude.as_ref().is_some_and(|x| x.is_match(line))
    }

    fn scan(&self, path: &Path) -> Result<Vec<ScanResult>, Stop> {
        let file = File::open(path).map_err(Stop::Io)?;
        self.scan_reader(path, BufReader::with_capacity(READ_CHUNK, file))
    }

    fn scan_reader(&self, path: &Path, mut reader: impl BufRead) -> Result<Vec<ScanResult>, Stop> {
        let mut line = Vec::new();
        let mut hits = Vec::new();
        let mut line_no = 0u64;

        loop {
            let chunk = match reader.fill_buf() {
                Ok(c) => c,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Stop::Io(e)),
            };
            if chunk.is_empty() {
                break;
            }
            if chunk.contains(&0) {
                return Err(Stop::Binary);
            }

            let (used, eol) = match chunk.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None    => (chunk.len(), false),
            };
            line.extend_from_slice(&chunk[..used]);
            reader.consume(used);

            if eol {
                line_no += 1;
                self.check_line(path, line_no, &line, &mut hits);
                line.clear();
            }
        }

        if !line.is_empty() {
            line_no += 1;
            self.check_line(path, line_no, &line, &mut hits);
        }

        Ok(hits)
    }

    fn check_line(&self, path: &Path, line_no: u64, raw: &[u8], hits: &mut Vec<ScanResult>) {
        let text = String::from_utf8_lossy(trim_eol(raw));
        if self.is_hit(&text) {
            hits.push(ScanResult::line_match(path, line_no, text.into_owned()));
        }
    }
}

impl Processor for PatternScan {
    fn process(&self, item: WorkItem) -> Vec<ScanResult> {
        match self.scan(&item.path) {
            Ok(hits) => hits,
            Err(Stop::Binary) => {
                debug!(path = %item.path.display(), "binary file, skipped");
                Vec::new()
            }
            Err(Stop::Io(e)) => vec![ScanResult::error(&item.path, e.to_string())],
        }
    }
}

fn compile(pattern: &str, ignore_case: bool) -> Result<Regex, ScanError> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| ScanError::InvalidPattern(e.to_string()))
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
