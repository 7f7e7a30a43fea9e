//! Fixed-window, per-caller request throttle.
//!
//! Counters live in process memory only. A restart resets every window;
//! this is accepted policy for an approximate limiter. Bursts of up to
//! twice the ceiling are possible across a window boundary.

use crate::config::{LimitConfig, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Expired entries are purged once the map grows past this many callers.
const PURGE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Analysis,
    Report,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Analysis => f.write_str("analysis"),
            Endpoint::Report   => f.write_str("report"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

pub struct FixedWindowLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(limit: &LimitConfig) -> Self {
        Self::new(limit.max_requests, Duration::from_secs(limit.window_secs))
    }

    pub fn check(&self, caller: &str) -> RateDecision {
        self.check_at(caller, Instant::now())
    }

    /// Count one request from `caller` at `now`.
    pub fn check_at(&self, caller: &str, now: Instant) -> RateDecision {
        // A poisoned lock only means another request panicked mid-update;
        // the counters are still usable.
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());

        if entries.len() > PURGE_THRESHOLD {
            entries.retain(|_, e| e.reset_at > now);
        }

        if let Some(entry) = entries.get_mut(caller) {
            if now < entry.reset_at {
                if entry.count >= self.max_requests {
                    let remaining = entry.reset_at.duration_since(now);
                    return RateDecision::Denied {
                        retry_after_secs: ceil_secs(remaining),
                    };
                }
                entry.count += 1;
                return RateDecision::Allowed;
            }
        }

        // First request, or the previous window has elapsed.
        if self.max_requests == 0 {
            return RateDecision::Denied {
                retry_after_secs: ceil_secs(self.window),
            };
        }
        entries.insert(
            caller.to_string(),
            RateLimitEntry {
                count: 1,
                reset_at: now + self.window,
            },
        );
        RateDecision::Allowed
    }

    pub fn tracked_callers(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Whole seconds, rounded up, never zero.
fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

/// The two independent limiters guarding the entry points.
pub struct RateLimiters {
    pub analysis: FixedWindowLimiter,
    pub report: FixedWindowLimiter,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            analysis: FixedWindowLimiter::from_config(&config.analysis),
            report:   FixedWindowLimiter::from_config(&config.report),
        }
    }

    pub fn for_endpoint(&self, endpoint: Endpoint) -> &FixedWindowLimiter {
        match endpoint {
            Endpoint::Analysis => &self.analysis,
            Endpoint::Report   => &self.report,
        }
    }
}
