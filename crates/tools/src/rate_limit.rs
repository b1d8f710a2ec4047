//! Per-action fixed-window call counters.
//!
//! Admission and charging are separate steps: the engine checks before
//! executing and charges only once an attempt has succeeded, so retried
//! failures never consume budget.

use serde::Serialize;
use spotctl_core::action::RateLimitPolicy;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct RateLimitState {
    calls: u32,
    window_start: Instant,
}

impl RateLimitState {
    fn roll(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) >= window {
            self.calls = 0;
            self.window_start = now;
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_ms: u64 },
}

/// Point-in-time view of one action's counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    pub calls: u32,
    pub window_elapsed_ms: u64,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    states: Mutex<HashMap<String, RateLimitState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `action` may run now under `policy`.
    ///
    /// Creates the counter on first use and rolls the window over once
    /// `window_ms` has elapsed since it opened.
    pub fn check(&self, action: &str, policy: &RateLimitPolicy) -> Admission {
        let now = Instant::now();
        let window = Duration::from_millis(policy.window_ms);
        let mut states = self.lock();

        let state = states.entry(action.to_string()).or_insert(RateLimitState {
            calls: 0,
            window_start: now,
        });

        state.roll(now, window);

        if state.calls >= policy.max_calls {
            let elapsed = now.saturating_duration_since(state.window_start);
            let retry_after_ms = window.saturating_sub(elapsed).as_millis() as u64;
            return Admission::Denied { retry_after_ms };
        }

        Admission::Allowed
    }

    /// Count one successful call against `action`'s current window.
    ///
    /// A success that lands after the window expired opens the next window.
    pub fn charge(&self, action: &str, policy: &RateLimitPolicy) {
        if let Some(state) = self.lock().get_mut(action) {
            state.roll(Instant::now(), Duration::from_millis(policy.window_ms));
            state.calls += 1;
        }
    }

    /// Calls counted in the current window, if the action has a counter.
    pub fn calls(&self, action: &str) -> Option<u32> {
        self.lock().get(action).map(|s| s.calls)
    }

    pub fn snapshot(&self) -> HashMap<String, RateLimitSnapshot> {
        let now = Instant::now();
        self.lock()
            .iter()
            .map(|(name, state)| {
                (
                    name.clone(),
                    RateLimitSnapshot {
                        calls: state.calls,
                        window_elapsed_ms: now.saturating_duration_since(state.window_start).as_millis() as u64,
                    },
                )
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RateLimitState>> {
        // Counters stay consistent even if a holder panicked.
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy::new(2, 1000)
    }

    #[tokio::test(start_paused = true)]
    async fn third_call_in_window_is_denied_then_window_resets() {
        let limiter = RateLimiter::new();

        for _ in 0..2 {
            assert_eq!(limiter.check("merge_playlists", &policy()), Admission::Allowed);
            limiter.charge("merge_playlists", &policy());
        }

        tokio::time::advance(Duration::from_millis(400)).await;
        match limiter.check("merge_playlists", &policy()) {
            Admission::Denied { retry_after_ms } => assert_eq!(retry_after_ms, 600),
            Admission::Allowed => panic!("third call should be denied"),
        }

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(limiter.check("merge_playlists", &policy()), Admission::Allowed);
        assert_eq!(limiter.calls("merge_playlists"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn checks_without_charge_never_deny() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert_eq!(limiter.check("like_songs", &policy()), Admission::Allowed);
        }
        assert_eq!(limiter.calls("like_songs"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn counters_are_independent_per_action() {
        let limiter = RateLimiter::new();
        for _ in 0..2 {
            limiter.check("a", &policy());
            limiter.charge("a", &policy());
        }
        assert!(matches!(limiter.check("a", &policy()), Admission::Denied { .. }));
        assert_eq!(limiter.check("b", &policy()), Admission::Allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_charge_counts_in_the_next_window() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.check("like_songs", &policy()), Admission::Allowed);

        // Retries outlast the window before the call finally succeeds.
        tokio::time::advance(Duration::from_millis(1500)).await;
        limiter.charge("like_songs", &policy());
        assert_eq!(limiter.calls("like_songs"), Some(1));
        assert_eq!(limiter.snapshot()["like_songs"].window_elapsed_ms, 0);

        assert_eq!(limiter.check("like_songs", &policy()), Admission::Allowed);
        limiter.charge("like_songs", &policy());
        assert!(matches!(limiter.check("like_songs", &policy()), Admission::Denied { .. }));
    }

    #[test]
    fn charge_without_counter_is_ignored() {
        let limiter = RateLimiter::new();
        limiter.charge("never_checked", &policy());
        assert_eq!(limiter.calls("never_checked"), None);
        assert!(limiter.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_always_denies() {
        let limiter = RateLimiter::new();
        let closed = RateLimitPolicy::new(0, 500);
        assert_eq!(
            limiter.check("execute_command", &closed),
            Admission::Denied { retry_after_ms: 500 }
        );
    }
}
