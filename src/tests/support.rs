//! Shared fixtures for the unit test suite.

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use std::sync::{Arc, Mutex};

use crate::adapters::InMemoryStorage;
use crate::services::{RequestContext, TaskManager};

/// Clock pinned to a settable instant so tests control timestamps and
/// lease expiry.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock poisoned") = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().expect("clock poisoned");
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock poisoned")
    }
}

pub type TestManager = TaskManager<InMemoryStorage<FixedClock>, FixedClock>;

/// Manager over a shared in-memory store and a pinned clock, with handles
/// for corrupting storage and stepping time.
pub struct Harness {
    pub manager: TestManager,
    pub storage: InMemoryStorage<FixedClock>,
    pub clock: Arc<FixedClock>,
    pub ctx: RequestContext,
}

pub fn harness() -> Harness {
    harness_at(datetime(2024, 3, 15, 10, 0, 0))
}

pub fn harness_at(now: DateTime<Utc>) -> Harness {
    let clock = Arc::new(FixedClock::new(now));
    let storage = InMemoryStorage::with_clock(Arc::clone(&clock));
    let manager = TaskManager::new(Arc::new(storage.clone()), Arc::clone(&clock));
    Harness {
        manager,
        storage,
        clock,
        ctx: RequestContext::new(),
    }
}

pub fn datetime(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("valid test timestamp")
}
