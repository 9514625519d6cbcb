//! Per-client request caps over a fixed time window.
//!
//! State lives in process memory only: it is lost on restart and is not
//! shared between server processes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Windows are swept for expiry once the map holds this many keys.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

pub trait RateLimiter: Send + Sync {
    /// Records one request for `key` and reports whether it may proceed.
    fn check(&self, key: &str) -> RateLimitDecision;

    fn allow(&self, key: &str) -> bool {
        self.check(key).allowed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitWindow {
    pub window_start: Instant,
    pub count: u32,
}

#[derive(Default)]
struct WindowTable {
    windows: HashMap<String, RateLimitWindow>,
    last_prune: Option<Instant>,
}

pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    table: Mutex<WindowTable>,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            table: Mutex::new(WindowTable::default()),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let window = self.window;

        // Sweep at most once per window; nothing can expire sooner.
        let sweep_due = table
            .last_prune
            .is_none_or(|at| now.saturating_duration_since(at) >= window);
        if table.windows.len() >= PRUNE_THRESHOLD && sweep_due {
            let before = table.windows.len();
            table.windows.retain(|_, w| now.saturating_duration_since(w.window_start) < window);
            table.last_prune = Some(now);
            debug!(pruned = before - table.windows.len(), "pruned expired rate limit windows");
        }

        let entry = table
            .windows
            .entry(key.to_string())
            .or_insert(RateLimitWindow { window_start: now, count: 0 });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            *entry = RateLimitWindow { window_start: now, count: 0 };
        }

        entry.count = entry.count.saturating_add(1);

        let elapsed = now.saturating_duration_since(entry.window_start);
        RateLimitDecision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(elapsed),
        }
    }

    /// Forgets every window, as after a restart.
    pub fn reset(&self) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.windows.clear();
        table.last_prune = None;
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}
