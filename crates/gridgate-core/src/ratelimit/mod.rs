//! Fixed-window rate limiting.
//!
//! Counts admitted requests per client key over fixed windows. A fixed
//! window admits up to `2 * max_requests` across a window boundary; that
//! matches the deployed behavior this gate preserves, and keeps the reset
//! arithmetic exact. Expired windows are evicted by a periodic background
//! sweep so a long tail of distinct clients cannot grow the store without
//! bound.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// Interval between background sweeps of expired windows.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limit policy: how many requests fit in one window.
///
/// One instance is shared process-wide and is immutable after
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Window length.
    pub window: Duration,
    /// Requests admitted per window.
    pub max_requests: u32,
}

impl RateLimitPolicy {
    /// Create a policy from a window length in milliseconds and a
    /// per-window request cap.
    #[must_use]
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            max_requests,
        }
    }
}

impl Default for RateLimitPolicy {
    /// 100 requests per minute.
    fn default() -> Self {
        Self::new(60_000, 100)
    }
}

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// The policy's per-window limit.
    pub limit: u32,
    /// Admissions left in the current window.
    pub remaining: u32,
    /// When the current window ends and the counter resets.
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// How long until the window resets. Zero if the reset is already
    /// past.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        (self.reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Point-in-time snapshot of the window store.
///
/// Best effort under concurrent mutation; for monitoring only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    /// Tracked client keys, expired windows included.
    pub total_clients: usize,
    /// Windows that have not yet expired.
    pub active_windows: usize,
}

/// Per-client counting state for the current window.
#[derive(Debug, Clone)]
struct Window {
    count: u32,
    /// Monotonic deadline driving admission decisions.
    expires: Instant,
    /// Wall-clock equivalent, captured at window creation, for callers
    /// that surface the reset time to clients.
    resets_at: DateTime<Utc>,
}

/// Per-client fixed-window request counter.
///
/// All state is in-memory and process-local; horizontally scaled
/// deployments enforce independent quotas per instance.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, Window>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter for the given policy.
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// The policy this limiter enforces.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Admit or reject one request on behalf of `client_key`.
    ///
    /// Lookup, lazy window replacement and the check-then-increment all
    /// happen under one lock, so two requests racing for the last slot in
    /// a window can never both be admitted. Synchronous and non-blocking:
    /// pure arithmetic plus a map access.
    pub fn check(&self, client_key: &str) -> RateDecision {
        let now = Instant::now();
        let limit = self.policy.max_requests;
        let mut windows = self.lock_windows();

        let window = match windows.entry(client_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if now >= occupied.get().expires {
                    // Window elapsed: replace, never carry the old count.
                    *occupied.get_mut() = self.fresh_window(now);
                }
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(self.fresh_window(now)),
        };

        if window.count >= limit {
            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: window.resets_at,
            };
        }

        window.count += 1;
        RateDecision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_at: window.resets_at,
        }
    }

    /// Unconditionally drop the entry for `client_key`, lifting any
    /// throttle in effect. Returns whether an entry existed.
    pub fn reset(&self, client_key: &str) -> bool {
        self.lock_windows().remove(client_key).is_some()
    }

    /// Snapshot the store for monitoring.
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let windows = self.lock_windows();
        RateLimiterStats {
            total_clients: windows.len(),
            active_windows: windows.values().filter(|w| now < w.expires).count(),
        }
    }

    /// Remove every expired window in a single pass over the store.
    ///
    /// Returns the number of evicted entries. Holds the store lock only
    /// for the duration of the pass and never re-enters [`Self::check`].
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.lock_windows();
        let before = windows.len();
        windows.retain(|_, window| now < window.expires);
        before - windows.len()
    }

    /// Spawn the background sweeper, replacing any previous one.
    ///
    /// Runs [`Self::sweep`] every 60 seconds on the current tokio runtime.
    /// The task holds only a weak reference, so dropping the limiter ends
    /// it; call [`Self::shutdown`] to stop it explicitly.
    pub fn start_sweeper(self: &Arc<Self>) {
        let limiter = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(limiter) = limiter.upgrade() else { break };
                let evicted = limiter.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, "swept expired rate limit windows");
                }
            }
        });

        if let Some(previous) = self.lock_sweeper().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background sweeper, if running.
    ///
    /// Idempotent; also invoked on drop so tests never leak timers.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lock_sweeper().take() {
            handle.abort();
        }
    }

    fn fresh_window(&self, now: Instant) -> Window {
        Window {
            count: 0,
            expires: now + self.policy.window,
            resets_at: Utc::now()
                + chrono::Duration::from_std(self.policy.window).unwrap_or_default(),
        }
    }

    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        // A panicked holder leaves consistent state; keep serving.
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("tracked_clients", &self.lock_windows().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(60_000, 3));

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("user:u_1");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 3);
        }

        let rejected = limiter.check("user:u_1");
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
    }

    #[test]
    fn test_rejection_does_not_consume_slots() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(60_000, 1));

        assert!(limiter.check("ip:10.0.0.1").allowed);
        for _ in 0..5 {
            assert!(!limiter.check("ip:10.0.0.1").allowed);
        }

        // The stored count stayed at the limit; a reset lifts exactly one
        // window's worth of state.
        assert!(limiter.reset("ip:10.0.0.1"));
        assert!(limiter.check("ip:10.0.0.1").allowed);
    }

    #[test]
    fn test_separate_keys_have_separate_quotas() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(60_000, 1));

        assert!(limiter.check("ip:10.0.0.1").allowed);
        assert!(limiter.check("ip:10.0.0.2").allowed);
        assert!(!limiter.check("ip:10.0.0.1").allowed);
        assert!(!limiter.check("ip:10.0.0.2").allowed);
    }

    #[tokio::test]
    async fn test_window_reset_law() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(1_000, 2));
        let key = "ip:1.2.3.4";

        let first = limiter.check(key);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.check(key);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.check(key);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);

        sleep(Duration::from_millis(1_050)).await;

        let fourth = limiter.check(key);
        assert!(fourth.allowed);
        assert_eq!(fourth.remaining, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_double_admit_under_contention() {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::new(60_000, 10)));

        let mut handles = Vec::new();
        for _ in 0..15 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.check("user:u_1").allowed
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 10, "exactly the limit must be admitted");
    }

    #[test]
    fn test_reset_unknown_key() {
        let limiter = RateLimiter::new(RateLimitPolicy::default());
        assert!(!limiter.reset("user:nobody"));
    }

    #[tokio::test]
    async fn test_stats_and_sweep() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(200, 5));

        let _ = limiter.check("ip:10.0.0.1");
        let _ = limiter.check("ip:10.0.0.2");

        let stats = limiter.stats();
        assert_eq!(stats.total_clients, 2);
        assert_eq!(stats.active_windows, 2);

        sleep(Duration::from_millis(250)).await;

        let stats = limiter.stats();
        assert_eq!(stats.total_clients, 2);
        assert_eq!(stats.active_windows, 0);

        assert_eq!(limiter.sweep(), 2);
        assert_eq!(limiter.stats().total_clients, 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_windows() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(60_000, 5));

        let _ = limiter.check("user:u_1");
        assert_eq!(limiter.sweep(), 0);
        assert_eq!(limiter.stats().total_clients, 1);
    }

    #[test]
    fn test_retry_after_is_bounded_by_window() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(60_000, 1));

        let _ = limiter.check("user:u_1");
        let rejected = limiter.check("user:u_1");
        assert!(!rejected.allowed);

        let wait = rejected.retry_after();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_sweeper_lifecycle() {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::default()));
        limiter.start_sweeper();
        // Restart replaces the previous task rather than stacking tasks.
        limiter.start_sweeper();
        limiter.shutdown();
        limiter.shutdown();
    }
}
