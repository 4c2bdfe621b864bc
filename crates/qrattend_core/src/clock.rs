//! Time source abstraction.
//!
//! Token issue/verify and ledger writes read "now" through [`Clock`] so tests
//! can pin the calendar day and the unix second.

use chrono::{DateTime, Local, NaiveDate, Utc};

pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current unix time in seconds.
    fn now_unix(&self) -> i64;

    /// Current calendar date for attendance bookkeeping.
    fn today(&self) -> NaiveDate;
}

/// Wall clock. `today` follows the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock frozen at one instant; `today` is the UTC date of that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    now_unix: i64,
    today: NaiveDate,
}

impl FixedClock {
    pub fn at(now_unix: i64) -> Self {
        let today = DateTime::from_timestamp(now_unix, 0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default();
        Self { now_unix, today }
    }

    /// Pins both the instant and the calendar day independently.
    pub fn with_date(now_unix: i64, today: NaiveDate) -> Self {
        Self { now_unix, today }
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.now_unix
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock};
    use chrono::NaiveDate;

    #[test]
    fn fixed_clock_derives_utc_date() {
        let clock = FixedClock::at(1_704_067_200 + 3_600);
        assert_eq!(clock.now_unix(), 1_704_070_800);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
