//! Wall-clock access and interval arithmetic.
//!
//! Everything here is pure except [`SystemClock`]. Times are local clinic
//! times (`Naive*`): the practice runs one calendar in one timezone.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Source of "now". Injected so that past/future rules are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

impl<C> Clock for std::sync::Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Local system wall clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a given instant (tests, replays).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self::new(date.and_time(time))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// A half-open interval `[start, end)` within one calendar day, at minute
/// resolution.
///
/// `end` may equal midnight (24:00) but never run past it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: u32,
    end: u32,
}

impl ValueObject for TimeRange {}

impl TimeRange {
    /// Build the interval starting at `start` and lasting `duration_minutes`.
    ///
    /// Returns `None` when the duration is zero or the interval would cross
    /// midnight into the next day.
    pub fn starting_at(start: NaiveTime, duration_minutes: u32) -> Option<Self> {
        let start = start.hour() * 60 + start.minute();
        let end = start.checked_add(duration_minutes)?;
        if duration_minutes == 0 || end > MINUTES_PER_DAY {
            return None;
        }
        Some(Self { start, end })
    }

    /// Like [`starting_at`](Self::starting_at) but clamps to the day instead
    /// of failing. Used for records already persisted.
    pub fn saturating(start: NaiveTime, duration_minutes: u32) -> Self {
        let start = (start.hour() * 60 + start.minute()).min(MINUTES_PER_DAY - 1);
        let end = start.saturating_add(duration_minutes.max(1)).min(MINUTES_PER_DAY);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveTime {
        minute_of_day(self.start)
    }

    /// End of the interval. An interval ending at midnight reports `00:00`.
    pub fn end(&self) -> NaiveTime {
        minute_of_day(self.end % MINUTES_PER_DAY)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end - self.start
    }

    /// Half-open overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let m = time.hour() * 60 + time.minute();
        self.start <= m && m < self.end
    }
}

fn minute_of_day(m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Opening hours of the practice. Both ends are inclusive for start times.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl BusinessHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time <= self.close
    }
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// "Today", "Tomorrow", "In 3 days", "2 days ago", ...
pub fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        d if d > 0 => format!("In {d} days"),
        d => format!("{} days ago", -d),
    }
}
