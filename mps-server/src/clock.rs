//! Time source for artifact expiry
//!
//! Stores never call `SystemTime::now()` directly so TTL behavior can be
//! driven deterministically in tests.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};

/// A source of wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> SystemTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug)]
pub struct MockClock {
    current: RwLock<SystemTime>,
}

impl MockClock {
    /// Start at the Unix epoch.
    pub fn new() -> Self {
        Self::with_time(SystemTime::UNIX_EPOCH)
    }

    pub fn with_time(time: SystemTime) -> Self {
        Self {
            current: RwLock::new(time),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current += duration;
    }

    pub fn set(&self, time: SystemTime) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}
