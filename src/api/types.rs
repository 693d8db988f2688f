//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::DEFAULT_RATE_PER_MINUTE;
use crate::core_state::CoreState;
use crate::identity::Caller;

/// Failed credential attempts before a source is locked out.
const MAX_AUTH_FAILURES: u32 = 5;
const LOCKOUT_DURATION: Duration = Duration::from_secs(300);

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub auth_lockout: Arc<Mutex<AuthLockout>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self::with_rate_limit(core, DEFAULT_RATE_PER_MINUTE)
    }

    pub fn with_rate_limit(core: Arc<CoreState>, per_minute: u32) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(per_minute))),
            auth_lockout: Arc::new(Mutex::new(AuthLockout::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Caller context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer credential resolved.
#[derive(Debug, Clone)]
pub struct CallerContext(pub Caller);

impl std::ops::Deref for CallerContext {
    type Target = Caller;

    fn deref(&self) -> &Caller {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-credential sliding window
// ═══════════════════════════════════════════════════════════

const RATE_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            last_sweep: Instant::now(),
        }
    }

    /// `Ok(())` or `Err(retry_after_secs)` if `key` exceeded its window.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    pub(crate) fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        if now.duration_since(self.last_sweep) >= RATE_WINDOW {
            self.sweep(now);
        }

        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < RATE_WINDOW);

        if entries.len() as u32 >= self.per_minute {
            let oldest = entries.first().copied().unwrap_or(now);
            let wait = RATE_WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs().max(1));
        }

        entries.push(now);
        Ok(())
    }

    /// Drop keys with no request inside the window.
    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < RATE_WINDOW);
            !entries.is_empty()
        });
        self.last_sweep = now;
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PER_MINUTE)
    }
}

// ═══════════════════════════════════════════════════════════
// Auth lockout: repeated bad credentials from one source
// ═══════════════════════════════════════════════════════════

#[derive(Debug)]
struct FailureRecord {
    count: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

impl FailureRecord {
    /// Locks that ran out and stale unlocked counts are both forgotten.
    fn expired(&self, now: Instant) -> bool {
        match self.locked_until {
            Some(until) => now >= until,
            None => now.duration_since(self.last_failure) >= LOCKOUT_DURATION,
        }
    }
}

/// Failure counts keyed by request source (peer address).
pub struct AuthLockout {
    failures: HashMap<String, FailureRecord>,
}

impl AuthLockout {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
        }
    }

    pub fn is_locked(&mut self, source: &str) -> bool {
        self.is_locked_at(source, Instant::now())
    }

    pub(crate) fn is_locked_at(&mut self, source: &str, now: Instant) -> bool {
        let Some(record) = self.failures.get(source) else {
            return false;
        };
        if record.expired(now) {
            self.failures.remove(source);
            return false;
        }
        record.locked_until.is_some()
    }

    pub fn record_failure(&mut self, source: &str) {
        self.record_failure_at(source, Instant::now());
    }

    pub(crate) fn record_failure_at(&mut self, source: &str, now: Instant) {
        self.failures.retain(|_, record| !record.expired(now));

        let record = self
            .failures
            .entry(source.to_string())
            .or_insert(FailureRecord {
                count: 0,
                last_failure: now,
                locked_until: None,
            });
        record.count += 1;
        record.last_failure = now;
        if record.count >= MAX_AUTH_FAILURES && record.locked_until.is_none() {
            record.locked_until = Some(now + LOCKOUT_DURATION);
            tracing::warn!(source, "Credential source locked out");
        }
    }

    pub fn clear(&mut self, source: &str) {
        self.failures.remove(source);
    }

    /// Number of sources with a live failure record.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Default for AuthLockout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.check("token:a").is_ok());
        }
    }

    #[test]
    fn rate_limiter_blocks_over_limit() {
        let mut limiter = RateLimiter::new(3);
        for _ in 0..3 {
            limiter.check("token:a").unwrap();
        }
        let retry = limiter.check("token:a").unwrap_err();
        assert!((1..=60).contains(&retry));
    }

    #[test]
    fn rate_limiter_keys_are_independent() {
        let mut limiter = RateLimiter::new(1);
        limiter.check("token:a").unwrap();
        assert!(limiter.check("token:b").is_ok());
        assert!(limiter.check("token:a").is_err());
    }

    #[test]
    fn lockout_after_repeated_failures() {
        let mut lockout = AuthLockout::new();
        for _ in 0..(MAX_AUTH_FAILURES - 1) {
            lockout.record_failure("ip:1");
        }
        assert!(!lockout.is_locked("ip:1"));
        lockout.record_failure("ip:1");
        assert!(lockout.is_locked("ip:1"));
        assert!(!lockout.is_locked("ip:2"));
    }

    #[test]
    fn rate_limiter_forgets_idle_keys() {
        let mut limiter = RateLimiter::new(10);
        let t0 = Instant::now();
        for i in 0..50 {
            limiter.check_at(&format!("token:{i}"), t0).unwrap();
        }
        assert_eq!(limiter.len(), 50);

        let later = t0 + RATE_WINDOW + Duration::from_secs(1);
        limiter.check_at("token:fresh", later).unwrap();
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn lockout_records_expire() {
        let mut lockout = AuthLockout::new();
        let t0 = Instant::now();
        lockout.record_failure_at("peer:10.0.0.1", t0);
        for _ in 0..MAX_AUTH_FAILURES {
            lockout.record_failure_at("peer:10.0.0.2", t0);
        }
        assert!(lockout.is_locked_at("peer:10.0.0.2", t0));
        assert_eq!(lockout.len(), 2);

        let later = t0 + LOCKOUT_DURATION + Duration::from_secs(1);
        assert!(!lockout.is_locked_at("peer:10.0.0.2", later));
        lockout.record_failure_at("peer:10.0.0.3", later);
        assert_eq!(lockout.len(), 1);
    }

    #[test]
    fn lockout_cleared_on_success() {
        let mut lockout = AuthLockout::new();
        for _ in 0..MAX_AUTH_FAILURES {
            lockout.record_failure("ip:1");
        }
        lockout.clear("ip:1");
        assert!(!lockout.is_locked("ip:1"));
    }
}
