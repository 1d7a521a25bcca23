//! Activity windows
//!
//! Each activity runs inside a fixed time window. A window is armed once per
//! activation and resolves exactly once: either the target behavior is
//! detected, or the time runs out. Time is fed in by the host as elapsed
//! durations, so the window never blocks.

use crate::types::Verdict;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolution state of an armed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Detected,
    TimedOut,
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// Timeouts are a regular negative result, not an error
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Outcome::Pending => None,
            Outcome::Detected => Some(Verdict::Passed),
            Outcome::TimedOut => Some(Verdict::NotPassed),
        }
    }
}

/// Countdown window with a one-shot resolution
#[derive(Debug, Clone)]
pub struct ActivityWindow {
    duration: Duration,
    remaining: Duration,
    outcome: Option<Outcome>,
}

impl ActivityWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            remaining: duration,
            outcome: None,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Start a fresh activation. Re-arming after a resolution is how a retry
    /// starts over.
    pub fn arm(&mut self) {
        self.remaining = self.duration;
        self.outcome = Some(Outcome::Pending);
    }

    /// Forget the current activation without resolving it
    pub fn disarm(&mut self) {
        self.outcome = None;
        self.remaining = self.duration;
    }

    /// `None` until armed
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Some(Outcome::Pending)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whole seconds left, rounded up, as shown on a countdown
    pub fn seconds_left(&self) -> u64 {
        let millis = self.remaining.as_millis() as u64;
        millis.div_ceil(1000)
    }

    /// Latch a detection. Returns `true` only for the call that resolved the
    /// window.
    pub fn detect(&mut self) -> bool {
        self.resolve(Outcome::Detected)
    }

    /// Resolve as timed out right away
    pub fn expire(&mut self) -> bool {
        if self.resolve(Outcome::TimedOut) {
            self.remaining = Duration::ZERO;
            true
        } else {
            false
        }
    }

    /// Advance the countdown. Returns the outcome if this tick resolved the
    /// window.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Outcome> {
        if !self.is_pending() {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() && self.resolve(Outcome::TimedOut) {
            return Some(Outcome::TimedOut);
        }
        None
    }

    fn resolve(&mut self, outcome: Outcome) -> bool {
        if self.is_pending() {
            self.outcome = Some(outcome);
            true
        } else {
            false
        }
    }
}
