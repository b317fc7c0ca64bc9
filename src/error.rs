use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    // Traversal
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid source: {}", .0.display())]
    InvalidSource(PathBuf),

    #[error("symlink loop at {}", .0.display())]
    SymlinkLoop(PathBuf),

    #[error("{}:{line}: {reason}", .path.display())]
    Listing {
        path:   PathBuf,
        line:   usize,
        reason: String,
    },

    // Config
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid worker count: {0}")]
    InvalidThreadCount(usize),

    #[error("unknown hash type ({0} hex characters)")]
    UnknownHashType(usize),

    // Runtime
    #[error("shutdown ordering violated: {0}")]
    Shutdown(String),

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("result collector thread panicked")]
    CollectorPanicked,

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Third-party extensibility
    #[error("source error: {0}")]
    Source(String),
}

impl ScanError {
    /// File, directory or listing the error is about. `None` for
    /// configuration and pipeline errors.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::PermissionDenied(p)
            | Self::NotFound(p)
            | Self::InvalidSource(p)
            | Self::SymlinkLoop(p)
            | Self::Listing { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether the scan can continue after this error.
    ///
    /// Recoverable errors (permission denied, symlink loops, unreadable
    /// subdirectories, malformed listing lines) are logged and counted while
    /// the walk keeps going.
    ///
    /// Everything else (bad configuration, broken source, shutdown bugs)
    /// halts the walk.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::NotFound(_)
                | Self::SymlinkLoop(_)
                | Self::Listing { .. }
                | Self::Io { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound         => Self::NotFound(path),
            _                                    => Self::Io { path, source },
        }
    }
}
