//! Shutdown ordering for the scan pipeline
//!
//! ```text
//! Running ──walker drops work sender──▶ WalkDone
//!         ──last worker exits, result queue closes──▶ WorkersDone
//!         ──collector drains and sorts──▶ CollectionDone
//!         ──engine joins collector, builds report──▶ Terminal
//! ```
//!
//! The engine makes the order hold by construction: the result queue closes
//! only when every worker has dropped its sender, and workers only exit once
//! the work queue is closed and empty. The coordinator records the
//! transitions so a broken ordering surfaces as an error instead of a hang.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Running        = 0,
    WalkDone       = 1,
    WorkersDone    = 2,
    CollectionDone = 3,
    Terminal       = 4,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::WalkDone,
            2 => Self::WorkersDone,
            3 => Self::CollectionDone,
            _ => Self::Terminal,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Running        => Some(Self::WalkDone),
            Self::WalkDone       => Some(Self::WorkersDone),
            Self::WorkersDone    => Some(Self::CollectionDone),
            Self::CollectionDone => Some(Self::Terminal),
            Self::Terminal       => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running        => "RUNNING",
            Self::WalkDone       => "WALK_DONE",
            Self::WorkersDone    => "WORKERS_DONE",
            Self::CollectionDone => "COLLECTION_DONE",
            Self::Terminal       => "TERMINAL",
        };
        f.write_str(s)
    }
}

/// Tracks the pipeline phase. Shared by reference across scoped threads.
#[derive(Debug)]
pub struct Coordinator {
    phase: AtomicU8,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Running as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Move from the current phase to `to`, which must be its direct
    /// successor.
    pub fn advance(&self, to: Phase) -> Result<(), ScanError> {
        let from = self.phase();
        if from.next() != Some(to) {
            return Err(ScanError::Shutdown(format!("{from} -> {to}")));
        }
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|actual| {
                ScanError::Shutdown(format!("{} -> {to} raced with {}", from, Phase::from_u8(actual)))
            })?;
        debug!(phase = %to, "pipeline phase");
        Ok(())
    }
}
