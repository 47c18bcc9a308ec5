//! Time source abstraction.
//!
//! All scheduling math in this crate runs at second resolution; the clock
//! already hands out floored instants so callers never have to think about
//! sub-second noise.

use std::sync::Mutex;

use chrono::{DateTime, Timelike, Utc};

/// Drops the sub-second part of a UTC instant.
pub fn floor_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(0).unwrap_or(t)
}

/// Monotonic wall-clock source producing UTC instants at second resolution.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        floor_to_seconds(Utc::now())
    }
}

/// Settable clock for tests and deterministic replay.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(floor_to_seconds(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock poisoned") = floor_to_seconds(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock poisoned")
    }
}
