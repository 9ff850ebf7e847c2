use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Submissions allowed per client per window unless configured otherwise.
pub const DEFAULT_LIMIT: u32 = 5;

/// Window length unless configured otherwise.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// The key shared by every client whose address couldn't be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Map size past which expired windows are swept on the next call.
const PRUNE_THRESHOLD: usize = 10_000;

/// Decides whether a client may make another submission.
pub trait Limiter {
    fn allow(&self, key: &str) -> bool;
}

#[derive(Clone, Copy, Debug)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// A fixed-window counter per client, held in process memory. Counts
/// are lost on restart and are not shared between processes.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    windows: HashMap<String, Window>,

    /// Earliest instant at which another sweep may run.
    next_sweep: Option<Instant>,
}

impl State {
    /// Drops expired windows once the map is large, at most once per
    /// window length.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self.windows.len() <= PRUNE_THRESHOLD {
            return;
        }

        if self.next_sweep.map_or(false, |next| now < next) {
            return;
        }

        self.windows.retain(|_, w| now <= w.resets_at);
        self.next_sweep = Some(now + window);
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(State::default()),
        }
    }

    /// Same as [`Limiter::allow`], evaluated at the given instant.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let key = if key.is_empty() { UNKNOWN_CLIENT } else { key };

        // a poisoned lock only means another request panicked
        // mid-update; the counts are still usable
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        state.sweep(now, self.window);

        let windows = &mut state.windows;

        match windows.get_mut(key) {
            Some(w) if now <= w.resets_at => {
                if w.count >= self.limit {
                    false
                } else {
                    w.count += 1;
                    true
                }
            }
            _ => {
                windows.insert(
                    key.to_owned(),
                    Window {
                        count: 1,
                        resets_at: now + self.window,
                    },
                );
                true
            }
        }
    }

    /// The number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.windows.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().windows.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl Limiter for RateLimiter {
    fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn sixth_submission_in_a_window_is_denied() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.allow_at("1.2.3.4", start + Duration::from_secs(i)));
        }

        assert!(!limiter.allow_at("1.2.3.4", start + Duration::from_secs(60)));
        assert!(!limiter.allow_at("1.2.3.4", start + DEFAULT_WINDOW));
    }

    #[test]
    fn a_new_window_starts_after_reset() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.allow_at("1.2.3.4", start));
        }
        assert!(!limiter.allow_at("1.2.3.4", start));

        let later = start + DEFAULT_WINDOW + Duration::from_millis(1);
        assert!(limiter.allow_at("1.2.3.4", later));

        // the fresh window counts from one again
        for _ in 0..4 {
            assert!(limiter.allow_at("1.2.3.4", later));
        }
        assert!(!limiter.allow_at("1.2.3.4", later));
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, DEFAULT_WINDOW);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn missing_keys_share_one_bucket() {
        let limiter = RateLimiter::new(1, DEFAULT_WINDOW);
        let now = Instant::now();

        assert!(limiter.allow_at("", now));
        assert!(!limiter.allow_at(UNKNOWN_CLIENT, now));
    }

    #[test]
    fn expired_windows_are_pruned() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();

        for i in 0..=PRUNE_THRESHOLD {
            limiter.allow_at(&format!("client-{}", i), start);
        }
        assert_eq!(limiter.tracked(), PRUNE_THRESHOLD + 1);

        limiter.allow_at("late", start + Duration::from_secs(5));
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn sweeps_run_at_most_once_per_window() {
        let window = Duration::from_secs(10);
        let limiter = RateLimiter::new(1, window);
        let start = Instant::now();

        for i in 0..=PRUNE_THRESHOLD {
            limiter.allow_at(&format!("client-{}", i), start);
        }

        // every window is still live, so the sweep removes nothing
        limiter.allow_at("first", start + Duration::from_secs(1));
        assert_eq!(limiter.tracked(), PRUNE_THRESHOLD + 2);

        // the initial clients have expired, but the next sweep isn't due
        limiter.allow_at("second", start + Duration::from_millis(10_500));
        assert_eq!(limiter.tracked(), PRUNE_THRESHOLD + 3);

        limiter.allow_at("third", start + Duration::from_secs(11));
        assert_eq!(limiter.tracked(), 3);
    }

    #[test]
    fn concurrent_bursts_are_not_undercounted() {
        let limiter = Arc::new(RateLimiter::new(50, DEFAULT_WINDOW));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || (0..20).filter(|_| limiter.allow("burst")).count())
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(allowed, 50);
    }
}
