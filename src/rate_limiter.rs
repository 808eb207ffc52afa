//! Per-client admission guard for the AI endpoints.
//!
//! Each identifier owns the arrival times of its recent admitted requests.
//! A request is admitted while fewer than `max_requests` of those fall inside
//! the trailing window measured from "now". Expired entries are purged lazily
//! when the identifier is next checked, and whole identifiers are swept out
//! once the table grows past `sweep_threshold`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Body text returned to clients that were not admitted.
pub const TOO_MANY_REQUESTS: &str = "Too many requests. Try again in a minute.";

/// Bucket shared by every client without a resolvable identifier.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    pub remaining: u32,
}

impl Admission {
    fn denied() -> Self {
        Self {
            admitted: false,
            remaining: 0,
        }
    }
}

/// Source of "now" in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Mapping from client identifier to its request timestamps.
///
/// Timestamps are kept in arrival order.
pub trait AdmissionStore: Send {
    /// Removes and returns the sequence for `identifier`, empty if unseen.
    fn take(&mut self, identifier: &str) -> VecDeque<u64>;

    fn put(&mut self, identifier: &str, timestamps: VecDeque<u64>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every identifier for which `keep` returns false.
    fn retain(&mut self, keep: &mut dyn FnMut(&VecDeque<u64>) -> bool);
}

/// In-process admission table.
#[derive(Debug, Default)]
pub struct AdmissionTable {
    windows: HashMap<String, VecDeque<u64>>,
}

impl AdmissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.windows.contains_key(identifier)
    }

    pub fn timestamps(&self, identifier: &str) -> Option<&VecDeque<u64>> {
        self.windows.get(identifier)
    }
}

impl AdmissionStore for AdmissionTable {
    fn take(&mut self, identifier: &str) -> VecDeque<u64> {
        self.windows.remove(identifier).unwrap_or_default()
    }

    fn put(&mut self, identifier: &str, timestamps: VecDeque<u64>) {
        self.windows.insert(identifier.to_string(), timestamps);
    }

    fn len(&self) -> usize {
        self.windows.len()
    }

    fn retain(&mut self, keep: &mut dyn FnMut(&VecDeque<u64>) -> bool) {
        self.windows.retain(|_, timestamps| keep(timestamps));
    }
}

pub struct RateLimiter<S = AdmissionTable> {
    table: Mutex<S>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
    max_requests: u32,
    sweep_threshold: usize,
}

impl RateLimiter<AdmissionTable> {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_store(config, AdmissionTable::new(), Arc::new(SystemClock))
    }
}

impl<S: AdmissionStore> RateLimiter<S> {
    pub fn with_store(config: &RateLimitConfig, store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(store),
            clock,
            window_ms: config.window_ms,
            max_requests: config.max_requests,
            sweep_threshold: config.sweep_threshold,
        }
    }

    /// Checks `identifier` against the injected clock.
    pub fn check(&self, identifier: &str) -> Admission {
        self.check_admission(identifier, self.clock.now_millis())
    }

    /// Decides whether a request from `identifier` arriving at `now_millis`
    /// is admitted, and records it if so.
    ///
    /// The table stays locked for the whole read-filter-append-store
    /// sequence, so concurrent checks for one identifier never admit more
    /// than `max_requests` inside a window.
    pub fn check_admission(&self, identifier: &str, now_millis: u64) -> Admission {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);

        let mut timestamps = table.take(identifier);
        timestamps.retain(|&t| self.is_live(t, now_millis));

        let admission = if timestamps.len() >= self.max_requests as usize {
            Admission::denied()
        } else {
            timestamps.push_back(now_millis);
            Admission {
                admitted: true,
                remaining: self.max_requests - timestamps.len() as u32,
            }
        };
        table.put(identifier, timestamps);

        if table.len() > self.sweep_threshold {
            self.sweep(&mut *table, now_millis);
        }

        admission
    }

    /// Number of identifiers currently held in the table.
    pub fn tracked_identifiers(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn is_live(&self, timestamp: u64, now_millis: u64) -> bool {
        now_millis.saturating_sub(timestamp) < self.window_ms
    }

    fn sweep(&self, table: &mut S, now_millis: u64) {
        let before = table.len();
        table.retain(&mut |timestamps: &VecDeque<u64>| {
            timestamps.iter().any(|&t| self.is_live(t, now_millis))
        });
        debug!(
            before,
            after = table.len(),
            "Swept expired identifiers from admission table"
        );
    }
}
