//! Calendar model for the MCP79412.
//!
//! [`Timestamp`] is the decimal view of the seven time-keeping registers. It
//! is a plain value type: the driver produces one per read and the alarm
//! arithmetic consumes it by reference.
//!
//! # Leap years
//!
//! The device keeps its own leap-year flag (LPYR, bit 5 of the month
//! register). It is maintained by the device firmware and is only refreshed
//! when the year register changes, so it can disagree with the Gregorian rule
//! after a careless write. [`LeapYearSource`] makes the choice between the two
//! explicit.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::bcd::BcdError;
use crate::epoch;

/// Days per month for a common year, indexed by month (index 0 unused).
const MONTH_DAYS: [u8; 13] = [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Which source of truth decides whether February has 29 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LeapYearSource {
    /// Use the device's LPYR status bit.
    #[default]
    Device,
    /// Apply the Gregorian rule to the year read from the device.
    Computed,
}

/// Errors that can occur while validating or converting a [`Timestamp`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateTimeError {
    /// A field is out of range or the date does not exist
    InvalidDateTime,
    /// The year is before 2000 (the year register holds 00-99)
    YearNotAfter1999,
    /// The year is after 2099 (the device has no century bit)
    YearNotBefore2100,
}

impl From<BcdError> for DateTimeError {
    fn from(_: BcdError) -> Self {
        DateTimeError::InvalidDateTime
    }
}

/// Gregorian leap-year rule.
pub const fn is_leap_year(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1-12). Returns 0 for an invalid month.
pub const fn days_in_month(month: u8, is_leap_year: bool) -> u8 {
    if month == 0 || month > 12 {
        return 0;
    }
    if month == 2 && is_leap_year {
        29
    } else {
        MONTH_DAYS[month as usize]
    }
}

/// A calendar timestamp with one second resolution, in UTC.
///
/// `weekday` runs from 1 (Monday) to 7 (Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Full year, e.g. 2024
    pub year: u16,
    /// Month (1-12)
    pub month: u8,
    /// Day of the month (1-31)
    pub day: u8,
    /// Day of the week (1-7, 1 = Monday)
    pub weekday: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59)
    pub second: u8,
}

impl Timestamp {
    /// Creates a validated timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is out of range or the day does not
    /// exist in the given month.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        weekday: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, DateTimeError> {
        let ts = Self {
            year,
            month,
            day,
            weekday,
            hour,
            minute,
            second,
        };
        ts.validate()?;
        Ok(ts)
    }

    /// Checks every field against its calendar range.
    ///
    /// # Errors
    ///
    /// Returns [`DateTimeError::YearNotAfter1999`] or
    /// [`DateTimeError::YearNotBefore2100`] for years the year register cannot
    /// hold, and [`DateTimeError::InvalidDateTime`] for anything else.
    pub fn validate(&self) -> Result<(), DateTimeError> {
        if self.year < 2000 {
            return Err(DateTimeError::YearNotAfter1999);
        }
        if self.year > 2099 {
            return Err(DateTimeError::YearNotBefore2100);
        }
        let max_day = days_in_month(self.month, is_leap_year(self.year));
        if self.day == 0 || self.day > max_day {
            return Err(DateTimeError::InvalidDateTime);
        }
        if self.weekday == 0 || self.weekday > 7 {
            return Err(DateTimeError::InvalidDateTime);
        }
        if self.hour > 23 || self.minute > 59 || self.second > 59 {
            return Err(DateTimeError::InvalidDateTime);
        }
        Ok(())
    }

    /// Returns `false` when the device holds a value that cannot be a real
    /// date: a zero month or day, or the register reset value of year 2000.
    pub fn is_real(&self) -> bool {
        self.year != 2000 && self.month != 0 && self.day != 0
    }

    /// Whether this timestamp's year is a leap year by the Gregorian rule.
    pub fn is_leap_year(&self) -> bool {
        is_leap_year(self.year)
    }

    /// Days in this timestamp's month.
    pub fn days_in_month(&self) -> u8 {
        days_in_month(self.month, self.is_leap_year())
    }

    /// One-based ordinal day within the year.
    pub fn day_of_year(&self) -> u16 {
        let leap = self.is_leap_year();
        let preceding: u16 = (1..self.month)
            .map(|m| u16::from(days_in_month(m, leap)))
            .sum();
        preceding + u16::from(self.day)
    }

    /// Seconds since 1970-01-01T00:00:00Z.
    pub fn to_unix_time(&self) -> i64 {
        epoch::to_unix_time(
            i64::from(self.year),
            i64::from(self.month),
            i64::from(self.day),
            i64::from(self.hour),
            i64::from(self.minute),
            i64::from(self.second),
        )
    }

    /// Converts to a chrono `NaiveDateTime`.
    ///
    /// # Errors
    ///
    /// Returns [`DateTimeError::InvalidDateTime`] if the date does not exist.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, DateTimeError> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .and_then(|d| {
            d.and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
        })
        .ok_or(DateTimeError::InvalidDateTime)
    }
}

impl TryFrom<&NaiveDateTime> for Timestamp {
    type Error = DateTimeError;

    fn try_from(datetime: &NaiveDateTime) -> Result<Self, Self::Error> {
        let year = datetime.year();
        if year < 2000 {
            error!("Year {} is too early! must be greater than 1999", year);
            return Err(DateTimeError::YearNotAfter1999);
        }
        if year > 2099 {
            error!("Year {} is too late! must be before 2100", year);
            return Err(DateTimeError::YearNotBefore2100);
        }
        let narrow = |v: u32| u8::try_from(v).map_err(|_| DateTimeError::InvalidDateTime);
        Timestamp::new(
            u16::try_from(year).map_err(|_| DateTimeError::InvalidDateTime)?,
            narrow(datetime.month())?,
            narrow(datetime.day())?,
            narrow(datetime.weekday().number_from_monday())?,
            narrow(datetime.hour())?,
            narrow(datetime.minute())?,
            narrow(datetime.second())?,
        )
    }
}
