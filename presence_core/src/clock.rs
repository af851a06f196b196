//! Wall-clock access and device-local time formatting.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use std::cell::Cell;

/// Serial line time format, e.g. `09:05:07 PM`
const LINE_TIME_FORMAT: &str = "%I:%M:%S %p";

/// Checkout hint format, e.g. `21:15`
const CHECKOUT_TIME_FORMAT: &str = "%H:%M";

/// Source of epoch seconds
pub trait Clock {
    fn now(&self) -> i64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> i64 {
        (**self).now()
    }
}

/// The host's wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, epoch: i64) {
        self.now.set(epoch);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.get()
    }
}

/// The zone in which times are shown on the device and its display
#[derive(Clone, Copy, Debug)]
pub enum LocalZone {
    Host,
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Zone from a configured offset in minutes east of UTC
    pub fn from_offset_minutes(minutes: Option<i32>) -> Self {
        match minutes.and_then(|m| FixedOffset::east_opt(m * 60)) {
            Some(offset) => LocalZone::Fixed(offset),
            None => LocalZone::Host,
        }
    }

    fn format(&self, epoch: i64, pattern: &str) -> String {
        let utc = match DateTime::<Utc>::from_timestamp(epoch, 0) {
            Some(dt) => dt,
            None => return epoch.to_string(),
        };
        match self {
            LocalZone::Host => Local.from_utc_datetime(&utc.naive_utc()).format(pattern).to_string(),
            LocalZone::Fixed(offset) => utc.with_timezone(offset).format(pattern).to_string(),
        }
    }

    /// `HH:MM:SS AM/PM`, used on committed-transition lines
    pub fn line_time(&self, epoch: i64) -> String {
        self.format(epoch, LINE_TIME_FORMAT)
    }

    /// `HH:MM`, used on the checkout hint line
    pub fn checkout_time(&self, epoch: i64) -> String {
        self.format(epoch, CHECKOUT_TIME_FORMAT)
    }

    /// RFC 3339 in the local zone, used by exports
    pub fn rfc3339(&self, epoch: i64) -> String {
        self.format(epoch, "%Y-%m-%dT%H:%M:%S%:z")
    }
}
