use std::path::PathBuf;

/// One unit of work produced by a [`Source`](crate::traits::Source).
///
/// Moved by value through the work queue and consumed by exactly one worker.
/// There is no shared ownership: once enqueued, the walker no longer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// File to open.
    pub path: PathBuf,

    /// What the file is compared against.
    pub target: Target,
}

/// The comparison value carried by a [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Compare against the processor's own value (its compiled pattern, or
    /// the digest it was constructed with).
    Content,

    /// Compare against this expected hex digest, typically read from a
    /// checksum listing.
    Digest(String),
}

impl WorkItem {
    pub fn content(path: impl Into<PathBuf>) -> Self {
        Self {
            path:   path.into(),
            target: Target::Content,
        }
    }

    pub fn digest(path: impl Into<PathBuf>, hex: impl Into<String>) -> Self {
        Self {
            path:   path.into(),
            target: Target::Digest(hex.into()),
        }
    }

    /// The expected digest carried by this item, if any.
    pub fn expected_digest(&self) -> Option<&str> {
        match &self.target {
            Target::Digest(hex) => Some(hex),
            Target::Content     => None,
        }
    }
}
