//! Cancellation, deadlines, and partial results.
//!
//! Every pass polls a [`ScanControl`] before each block fetch. When it says
//! stop, the pass returns what it has so far wrapped in a [`Scan`] whose
//! `stopped` field names the reason, so a truncated result is never mistaken
//! for a complete one.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

/// A cloneable flag that requests a running pass to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a pass stopped before covering the whole store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
    VisitLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::VisitLimit => write!(f, "visit limit reached"),
        }
    }
}

/// Stop conditions shared by all passes of one run.
#[derive(Clone, Debug, Default)]
pub struct ScanControl {
    cancel: CancelToken,
    deadline: Option<Instant>,
    max_visits: Option<usize>,
}

impl ScanControl {
    /// No cancellation source, no deadline, no visit cap.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_max_visits(mut self, max_visits: usize) -> Self {
        self.max_visits = Some(max_visits);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Decide whether a pass that has already visited `visited` blocks may
    /// fetch another one.
    pub fn should_stop(&self, visited: usize) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(StopReason::DeadlineExceeded);
        }
        if self.max_visits.is_some_and(|max| visited >= max) {
            return Some(StopReason::VisitLimit);
        }
        None
    }
}

/// The result of a pass, labelled complete or partial.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Scan<T> {
    pub value: T,
    /// `None` when the pass covered the whole store.
    pub stopped: Option<StopReason>,
}

impl<T> Scan<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            stopped: None,
        }
    }

    pub fn partial(value: T, reason: StopReason) -> Self {
        Self {
            value,
            stopped: Some(reason),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Scan<U> {
        Scan {
            value: f(self.value),
            stopped: self.stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_stops() {
        assert_eq!(ScanControl::unbounded().should_stop(usize::MAX), None);
    }

    #[test]
    fn cancel_is_seen_through_clones() {
        let token = CancelToken::new();
        let ctl = ScanControl::unbounded().with_cancel(token.clone());
        assert_eq!(ctl.should_stop(0), None);
        token.cancel();
        assert_eq!(ctl.should_stop(0), Some(StopReason::Cancelled));
        assert!(ctl.cancel_token().is_cancelled());
    }

    #[test]
    fn past_deadline_stops() {
        let ctl = ScanControl::unbounded().with_deadline(Instant::now());
        assert_eq!(ctl.should_stop(0), Some(StopReason::DeadlineExceeded));
    }

    #[test]
    fn visit_cap_applies_at_the_limit() {
        let ctl = ScanControl::unbounded().with_max_visits(3);
        assert_eq!(ctl.should_stop(2), None);
        assert_eq!(ctl.should_stop(3), Some(StopReason::VisitLimit));
    }

    #[test]
    fn cancellation_takes_precedence() {
        let token = CancelToken::new();
        token.cancel();
        let ctl = ScanControl::unbounded()
            .with_cancel(token)
            .with_max_visits(0);
        assert_eq!(ctl.should_stop(5), Some(StopReason::Cancelled));
    }

    #[test]
    fn map_keeps_the_label() {
        let scan = Scan::partial(2, StopReason::VisitLimit).map(|v| v * 10);
        assert_eq!(scan.value, 20);
        assert!(!scan.is_complete());
        assert!(Scan::complete(()).is_complete());
    }

    #[test]
    fn stop_reason_display() {
        assert_eq!(StopReason::Cancelled.to_string(), "cancelled");
        assert_eq!(StopReason::DeadlineExceeded.to_string(), "deadline exceeded");
        assert_eq!(StopReason::VisitLimit.to_string(), "visit limit reached");
    }
}
