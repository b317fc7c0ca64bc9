use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::error::ScanError;

/// Which file names the walker hands to the pool.
///
/// Applied to the final path component only, never to directories.
#[derive(Debug, Clone, Default)]
pub enum NameFilter {
    #[default]
    Any,
    Glob(GlobMatcher),
    Regex(Regex),
}

impl NameFilter {
    /// Shell-style glob such as `*.go` or `report-??.txt`.
    pub fn glob(pattern: &str) -> Result<Self, ScanError> {
        let glob = Glob::new(pattern)
            .map_err(|e| ScanError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self::Glob(glob.compile_matcher()))
    }

    pub fn regex(pattern: &str) -> Result<Self, ScanError> {
        let re = Regex::new(pattern)
            .map_err(|e| ScanError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self::Regex(re))
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Any      => true,
            Self::Glob(g)  => g.is_match(name),
            Self::Regex(r) => r.is_match(name),
        }
    }
}
