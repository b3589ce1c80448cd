//! Rolling-window limiter for key set fetches.
//!
//! Each key set URI owns one [`FetchWindow`]. It records when recent fetches
//! started and refuses a new one once `limit` fetches fall inside the
//! trailing window. It never sleeps: callers get an immediate refusal and
//! decide for themselves whether to back off and retry.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Length of the rolling window.
pub(crate) const FETCH_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub(crate) struct FetchWindow {
    started: VecDeque<Instant>,
    limit: u32,
    window: Duration,
}

impl FetchWindow {
    pub(crate) fn new(limit: u32) -> Self {
        Self::with_window(limit, FETCH_WINDOW)
    }

    pub(crate) fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            started: VecDeque::new(),
            limit,
            window,
        }
    }

    /// Records a fetch at `now` if the window has room. Returns `false` when
    /// the limit is already reached.
    pub(crate) fn try_acquire(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.started.len() >= self.limit as usize {
            return false;
        }
        self.started.push_back(now);
        true
    }

    /// Fetches still available in the window at `now`.
    pub(crate) fn remaining(&mut self, now: Instant) -> u32 {
        self.prune(now);
        self.limit.saturating_sub(self.started.len() as u32)
    }

    /// Whether no fetch falls inside the window at `now`. An idle window is
    /// indistinguishable from a new one.
    pub(crate) fn is_idle(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.started.is_empty()
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.started.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.started.pop_front();
            } else {
                break;
            }
        }
    }
}
