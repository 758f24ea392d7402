//! Fixed-window rate limiting for payment, webhook, and API endpoints.
//!
//! Budgets are per endpoint class and per caller identity (`user:<id>` for
//! authenticated browser calls, `ip:<addr>` for server-to-server webhook
//! ingestion). Counters live in process memory behind [`RateLimitStore`];
//! a deployment running multiple instances swaps in a shared-store
//! implementation (atomic increment-and-expire) without touching callers.
//!
//! Window bookkeeping is rebuild-on-read: `check` itself resets an expired
//! window, so the periodic sweep only bounds memory and can never resurrect
//! or extend a live window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderName;
use chrono::Utc;

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// One minute, the window length for every endpoint class.
const WINDOW_MS: i64 = 60_000;

/// Sweep cadence for dropping expired counters.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Endpoint classes with distinct request budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitClass {
    /// Payment create/verify: strict, these hit the gateway.
    Payment,
    /// Webhook ingestion: trusted but high-volume caller.
    Webhook,
    /// Generic API endpoints.
    Api,
    /// Authentication endpoints (owned by the external login flow).
    Auth,
}

impl RateLimitClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Webhook => "webhook",
            Self::Api => "api",
            Self::Auth => "auth",
        }
    }

    fn limit(&self, config: &RateLimitConfig) -> u32 {
        match self {
            Self::Payment => config.payment_rpm,
            Self::Webhook => config.webhook_rpm,
            Self::Api => config.api_rpm,
            Self::Auth => config.auth_rpm,
        }
    }
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix millis at which the current window ends.
    pub reset_at_ms: i64,
}

impl Decision {
    /// Window end as unix seconds, rounded up (for the Reset header).
    pub fn reset_at_secs(&self) -> i64 {
        (self.reset_at_ms + 999) / 1000
    }

    pub fn retry_after_secs(&self, now_ms: i64) -> i64 {
        ((self.reset_at_ms - now_ms).max(0) + 999) / 1000
    }
}

/// Counter storage. Implementations must serialize increments per key so
/// concurrent requests from one caller cannot undercount.
pub trait RateLimitStore: Send + Sync {
    fn check(&self, key: &str, limit: u32, window_ms: i64, now_ms: i64) -> Decision;

    /// Drop entries whose window ended at or before `now_ms`.
    /// Returns the number of entries removed.
    fn sweep(&self, now_ms: i64) -> usize;
}

struct Entry {
    count: u32,
    reset_at_ms: i64,
}

/// Process-local store: one mutex-guarded map.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn check(&self, key: &str, limit: u32, window_ms: i64, now_ms: i64) -> Decision {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            reset_at_ms: now_ms + window_ms,
        });

        // Expired window: start fresh rather than waiting for the sweep.
        if now_ms >= entry.reset_at_ms {
            entry.count = 0;
            entry.reset_at_ms = now_ms + window_ms;
        }

        if entry.count >= limit {
            return Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_ms: entry.reset_at_ms,
            };
        }

        entry.count += 1;
        Decision {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_at_ms: entry.reset_at_ms,
        }
    }

    fn sweep(&self, now_ms: i64) -> usize {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|_, e| e.reset_at_ms > now_ms);
        before - entries.len()
    }
}

/// Limiter handed to handlers through `AppState`.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            config,
        }
    }

    pub fn with_store(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { store, config }
    }

    /// Count one request from `identifier` against `class`'s budget.
    /// Identifiers are namespaced per class so a caller's payment budget
    /// is independent of its API budget.
    pub fn check(&self, identifier: &str, class: RateLimitClass) -> Decision {
        let key = format!("{}:{}", class.as_str(), identifier);
        let now_ms = Utc::now().timestamp_millis();
        self.store
            .check(&key, class.limit(&self.config), WINDOW_MS, now_ms)
    }

    /// Like [`check`](Self::check) but converts a denial into the 429 error
    /// carrying `Retry-After` and the X-RateLimit headers.
    pub fn enforce(
        &self,
        identifier: &str,
        class: RateLimitClass,
    ) -> Result<Decision, AppError> {
        let decision = self.check(identifier, class);
        if decision.allowed {
            return Ok(decision);
        }
        let now_ms = Utc::now().timestamp_millis();
        Err(AppError::RateLimited {
            limit: decision.limit,
            reset_at: decision.reset_at_secs(),
            retry_after_secs: decision.retry_after_secs(now_ms).max(1),
        })
    }

    pub fn sweep_now(&self) -> usize {
        self.store.sweep(Utc::now().timestamp_millis())
    }
}

/// Response headers describing the caller's remaining budget, attached to
/// successful responses as well as 429s.
pub fn rate_limit_headers(decision: &Decision) -> [(HeaderName, String); 3] {
    [
        (
            HeaderName::from_static("x-ratelimit-limit"),
            decision.limit.to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            decision.remaining.to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            decision.reset_at_secs().to_string(),
        ),
    ]
}

/// Background task removing expired counters every five minutes.
pub fn spawn_sweep_task(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = limiter.sweep_now();
            if removed > 0 {
                tracing::debug!("Rate limit sweep removed {} expired entries", removed);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::new()
    }

    #[test]
    fn window_opens_on_first_request() {
        let s = store();
        let d = s.check("user:u1", 10, WINDOW_MS, 1_000);
        assert!(d.allowed);
        assert_eq!(d.remaining, 9);
        assert_eq!(d.reset_at_ms, 61_000);
    }

    #[test]
    fn denies_once_limit_reached() {
        let s = store();
        for _ in 0..3 {
            assert!(s.check("user:u1", 3, WINDOW_MS, 1_000).allowed);
        }
        let d = s.check("user:u1", 3, WINDOW_MS, 1_000);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn fresh_window_after_reset() {
        let s = store();
        for _ in 0..3 {
            s.check("user:u1", 3, WINDOW_MS, 1_000);
        }
        assert!(!s.check("user:u1", 3, WINDOW_MS, 2_000).allowed);
        // at reset time the next call opens a new window
        let d = s.check("user:u1", 3, WINDOW_MS, 61_000);
        assert!(d.allowed);
        assert_eq!(d.remaining, 2);
    }

    #[test]
    fn identifiers_are_independent() {
        let s = store();
        for _ in 0..3 {
            s.check("user:u1", 3, WINDOW_MS, 1_000);
        }
        assert!(!s.check("user:u1", 3, WINDOW_MS, 1_000).allowed);
        assert!(s.check("user:u2", 3, WINDOW_MS, 1_000).allowed);
    }

    #[test]
    fn sweep_keeps_live_windows() {
        let s = store();
        s.check("user:old", 3, WINDOW_MS, 1_000);
        s.check("user:new", 3, WINDOW_MS, 50_000);
        // old window ended at 61s, new one ends at 110s
        assert_eq!(s.sweep(70_000), 1);
        // live entry keeps its count
        let d = s.check("user:new", 3, WINDOW_MS, 70_000);
        assert_eq!(d.remaining, 1);
    }

    #[test]
    fn sweep_does_not_resurrect_expired_entry_seen_by_check() {
        let s = store();
        s.check("user:u1", 3, WINDOW_MS, 1_000);
        // check after expiry rebuilds the window; a later sweep at the same
        // instant must leave the rebuilt window alone
        let d = s.check("user:u1", 3, WINDOW_MS, 61_000);
        assert_eq!(s.sweep(61_000), 0);
        let again = s.check("user:u1", 3, WINDOW_MS, 61_500);
        assert_eq!(again.reset_at_ms, d.reset_at_ms);
        assert_eq!(again.remaining, 1);
    }

    #[test]
    fn concurrent_checks_never_undercount() {
        use std::sync::Arc;
        use std::thread;

        let s = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&s);
            handles.push(thread::spawn(move || {
                let mut allowed = 0;
                for _ in 0..25 {
                    if s.check("user:u1", 100, WINDOW_MS, 1_000).allowed {
                        allowed += 1;
                    }
                }
                allowed
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 200 attempts against a budget of 100: exactly 100 admitted
        assert_eq!(total, 100);
    }

    #[test]
    fn classes_have_separate_budgets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            payment_rpm: 1,
            webhook_rpm: 2,
            api_rpm: 2,
            auth_rpm: 1,
        });
        assert!(limiter.check("user:u1", RateLimitClass::Payment).allowed);
        assert!(!limiter.check("user:u1", RateLimitClass::Payment).allowed);
        // same identifier, different class, untouched budget
        assert!(limiter.check("user:u1", RateLimitClass::Api).allowed);
        assert!(limiter.check("user:u1", RateLimitClass::Auth).allowed);
        assert!(!limiter.check("user:u1", RateLimitClass::Auth).allowed);
    }
}
