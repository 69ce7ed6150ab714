//! Sliding-window rate limiting for validation attempts.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Allows at most `max_attempts` per identifier within any `window`.
///
/// Identifiers are caller-chosen (a form name, a user id, an IP). Attempts
/// older than the window are forgotten on the next check for that identifier,
/// and identifiers with no attempts left in the window are dropped by a sweep
/// that runs at most once per window.
#[derive(Debug)]
pub struct InputValidator {
    max_attempts: usize,
    window: Duration,
    attempts: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl InputValidator {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }

    /// Record an attempt for `identifier` if it is within the limit.
    ///
    /// Returns `false` without recording anything once the limit is reached.
    pub fn check_rate_limit(&mut self, identifier: &str) -> bool {
        let now = Instant::now();
        if now.saturating_duration_since(self.last_sweep) >= self.window {
            self.sweep(now);
        }
        if self.max_attempts == 0 {
            return false;
        }

        let window = self.window;
        let history = self.attempts.entry(identifier.to_string()).or_default();
        prune(history, now, window);

        if history.len() >= self.max_attempts {
            tracing::debug!(identifier, "validation rate limit reached");
            return false;
        }
        history.push_back(now);
        true
    }

    /// Attempts left for `identifier` in the current window.
    pub fn remaining(&mut self, identifier: &str) -> usize {
        let now = Instant::now();
        let window = self.window;
        match self.attempts.get_mut(identifier) {
            Some(history) => {
                prune(history, now, window);
                let used = history.len();
                if used == 0 {
                    self.attempts.remove(identifier);
                }
                self.max_attempts.saturating_sub(used)
            }
            None => self.max_attempts,
        }
    }

    /// Number of identifiers currently holding history.
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }

    /// Drop every attempt outside the window and every identifier left empty.
    pub fn purge_stale(&mut self) {
        self.sweep(Instant::now());
    }

    fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.attempts.retain(|_, history| {
            prune(history, now, window);
            !history.is_empty()
        });
        self.last_sweep = now;
    }

    pub fn reset(&mut self, identifier: &str) {
        self.attempts.remove(identifier);
    }
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = history.front() {
        if now.saturating_duration_since(*oldest) >= window {
            history.pop_front();
        } else {
            break;
        }
    }
}
