use chrono::{Duration, NaiveDateTime, Utc};

/// Vietnam is UTC+7 all year.
const VN_UTC_OFFSET_HOURS: i64 = 7;

pub trait Clock: Send + Sync {
    /// Current wall-clock time in Vietnam.
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::hours(VN_UTC_OFFSET_HOURS)
    }
}

/// A clock pinned to one instant.
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
