//! Clock sources and discretized ticks.
//!
//! Reminder matching works at minute resolution (`HH:MM` in local time);
//! countdowns work off a monotonic one-second tick. [`Ticker`] turns an
//! externally supplied `Instant` into "how many periods are due", so the
//! engine can be driven by a real interval or stepped by hand in tests.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A local wall-clock time truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockMinute {
    hour: u8,
    minute: u8,
}

impl ClockMinute {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Truncate any chrono time value to its minute.
    pub fn from_time<T: Timelike>(time: &T) -> Self {
        // Timelike guarantees hour < 24 and minute < 60
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for ClockMinute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockMinute {
    type Err = AppError;

    /// Accepts exactly `HH:MM`, two digits on each side.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && bytes[..2].iter().all(u8::is_ascii_digit)
            && bytes[3..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(AppError::validation(format!("expected HH:MM, got {:?}", s)));
        }

        let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
        Self::new(hour, minute)
            .ok_or_else(|| AppError::validation(format!("time out of range: {:?}", s)))
    }
}

impl TryFrom<String> for ClockMinute {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockMinute> for String {
    fn from(value: ClockMinute) -> Self {
        value.to_string()
    }
}

/// Source of local wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock stuck at one instant. Useful for hosts replaying a moment and for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

/// Produces minute samples for reminder matching and a monotonic second
/// counter for countdowns.
#[derive(Debug)]
pub struct ClockSampler<C> {
    clock: C,
    seconds: u64,
}

impl<C: Clock> ClockSampler<C> {
    /// Probe the clock once. A clock that reports a time before the Unix
    /// epoch is treated as missing and the engine refuses to start.
    pub fn new(clock: C) -> AppResult<Self> {
        let probe = clock.now();
        if probe.timestamp() < 0 {
            return Err(AppError::clock(format!(
                "clock source reports {} which is before the Unix epoch",
                probe.to_rfc3339()
            )));
        }
        Ok(Self { clock, seconds: 0 })
    }

    pub fn sample_minute(&self) -> ClockMinute {
        ClockMinute::from_time(&self.clock.now())
    }

    /// Advance and return the second counter. Never decreases.
    pub fn sample_second(&mut self) -> u64 {
        self.seconds = self.seconds.saturating_add(1);
        self.seconds
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// A repeating trigger stepped by explicit `advance(now)` calls.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// A ticker whose first period comes due at `first_due` instead of immediately.
    pub fn starting_at(period: Duration, first_due: Instant) -> Self {
        Self {
            period,
            next_due: Some(first_due),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of whole periods that came due at `now`. The first call always
    /// fires once and anchors the schedule. `now` going backwards fires nothing.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let Some(due) = self.next_due else {
            self.next_due = Some(now + self.period);
            return 1;
        };
        if now < due || self.period.is_zero() {
            return 0;
        }

        let behind = now.duration_since(due);
        let fired = (behind.as_nanos() / self.period.as_nanos()) as u32 + 1;
        self.next_due = Some(due + self.period * fired);
        fired
    }

    /// Forget the anchor so the next `advance` fires immediately.
    pub fn reset(&mut self) {
        self.next_due = None;
    }
}
