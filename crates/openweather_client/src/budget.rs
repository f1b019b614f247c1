//! Pass-scoped provider call budget.
//!
//! Decision logic is pure in an injected `Instant` so the window arithmetic
//! is testable without waiting; the actual sleep happens in the caller.

use std::time::Duration;
use tokio::time::Instant;

/// Outcome of asking the budget to admit one more provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed now; it has been counted.
    Granted,
    /// The ceiling is reached: cool down for this long, then ask again.
    CoolDown(Duration),
}

/// Rolling call-count budget, reset every window.
///
/// Lives for exactly one synchronization pass; a fresh pass builds a fresh
/// budget. Not shared across tasks.
#[derive(Debug)]
pub struct FetchBudget {
    ceiling: u32,
    window: Duration,
    calls_in_window: u32,
    window_started: Option<Instant>,
}

impl FetchBudget {
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            ceiling: ceiling.max(1),
            window,
            calls_in_window: 0,
            window_started: None,
        }
    }

    /// Ask to admit one call at `now`.
    ///
    /// Grants and counts the call while the window has headroom. Once the
    /// ceiling is hit, returns the full window as a cooldown; after that much
    /// time has passed the window restarts and the next admitted call counts
    /// as 1.
    pub fn admit(&mut self, now: Instant) -> Admission {
        match self.window_started {
            None => {
                self.window_started = Some(now);
                self.calls_in_window = 1;
                Admission::Granted
            }
            Some(started) if now.duration_since(started) >= self.window => {
                self.window_started = Some(now);
                self.calls_in_window = 1;
                Admission::Granted
            }
            Some(_) if self.calls_in_window < self.ceiling => {
                self.calls_in_window += 1;
                Admission::Granted
            }
            Some(_) => Admission::CoolDown(self.window),
        }
    }

    /// Calls counted in the current window.
    pub fn calls_in_window(&self) -> u32 {
        self.calls_in_window
    }
}
