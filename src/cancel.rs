use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::results::Termination;

/// Cooperative stop signal shared between the caller and the walker.
///
/// Cancelling stops the walk at the next item boundary. Items already in the
/// queue are still processed, so the report stays consistent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wall-clock limit for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(timeout: Option<Duration>) -> Self {
        Self {
            at: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Cancel token and deadline as one check, handed to sources through
/// [`WalkConfig`](crate::WalkConfig).
///
/// Sources call [`check`](Self::check) once per raw entry, including the
/// entries they filter out, so a walk that yields nothing still stops on
/// time. The first reason seen is latched for the engine to report.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    cancel:   CancelToken,
    deadline: Deadline,
    fired:    Arc<OnceLock<Termination>>,
}

impl StopSignal {
    pub fn new(cancel: CancelToken, deadline: Deadline) -> Self {
        Self {
            cancel,
            deadline,
            fired: Arc::new(OnceLock::new()),
        }
    }

    /// `Some` once the token is cancelled or the deadline has passed.
    pub fn check(&self) -> Option<Termination> {
        if let Some(t) = self.fired.get() {
            return Some(*t);
        }
        let reason = if self.cancel.is_cancelled() {
            Termination::Cancelled
        } else if self.deadline.expired() {
            Termination::TimedOut
        } else {
            return None;
        };
        Some(*self.fired.get_or_init(|| reason))
    }

    /// The reason latched by an earlier [`check`](Self::check), if any.
    pub fn fired(&self) -> Option<Termination> {
        self.fired.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn deadline_without_timeout_never_expires() {
        assert!(!Deadline::after(None).expired());
        assert!(!Deadline::default().expired());
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        assert!(Deadline::after(Some(Duration::ZERO)).expired());
    }

    #[test]
    fn stop_signal_latches_first_reason() {
        let token = CancelToken::new();
        let stop = StopSignal::new(token.clone(), Deadline::after(None));
        assert_eq!(stop.check(), None);
        assert_eq!(stop.fired(), None);

        token.cancel();
        assert_eq!(stop.check(), Some(Termination::Cancelled));

        let clone = stop.clone();
        assert_eq!(clone.fired(), Some(Termination::Cancelled));
    }

    #[test]
    fn stop_signal_reports_expired_deadline() {
        let stop = StopSignal::new(CancelToken::new(), Deadline::after(Some(Duration::ZERO)));
        assert_eq!(stop.check(), Some(Termination::TimedOut));
        assert_eq!(stop.fired(), Some(Termination::TimedOut));
        assert_eq!(StopSignal::default().check(), None);
    }
}
