use chrono::{DateTime, Utc};

/// Source of commit timestamps for attendance events.
///
/// The tracker reads the clock once per tick, at the moment transitions
/// are committed.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Used for replaying recorded logs
/// with reproducible output, and by tests.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
