//! Alarm scheduling for the MCP79412 RTC.
//!
//! The device has two independent alarm slots. Each compares a configurable
//! subset of the calendar fields (its [`MatchMode`]) against the running
//! clock and raises its interrupt flag on a match.
//!
//! This module holds the pure side of alarm handling:
//!
//! - [`compute_alarm_time`] adds a relative offset to a [`Timestamp`] with
//!   ripple-carry arithmetic, for "N seconds from now" alarms.
//! - [`periodic_seconds`], [`periodic_minutes`] and [`periodic_hours`] build
//!   single-field targets that repeat every minute, hour or day.
//! - [`AlarmTarget`] converts between a target and the six alarm registers.
//!
//! # Known approximations in `compute_alarm_time`
//!
//! The relative computation is kept bit-for-bit compatible with existing
//! deployments:
//!
//! - The day of month wraps with `sum % (days_in_month + 1)` and a result of
//!   zero is clamped to 1. Offsets that cross a month end by more than the
//!   carry therefore land one day early.
//! - December rolls over to January without touching the year. The alarm
//!   registers have no year field, so this only affects the returned value.

use crate::{
    calendar::{days_in_month, DateTimeError, Timestamp},
    registers::{AlarmWeekDay, Block, Field},
};

/// Error type for alarm configuration operations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// Invalid time component value
    InvalidTime(&'static str),
    /// Invalid day of week (must be 1-7)
    InvalidDayOfWeek,
    /// Invalid date of month (must be 1-31)
    InvalidDateOfMonth,
    /// Invalid month (must be 1-12)
    InvalidMonth,
    /// `Timestamp` conversion error
    DateTime(DateTimeError),
}

impl From<DateTimeError> for AlarmError {
    fn from(e: DateTimeError) -> Self {
        AlarmError::DateTime(e)
    }
}

/// One of the two alarm units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSlot {
    Alarm0 = 0,
    Alarm1 = 1,
}

impl AlarmSlot {
    /// Slot for a zero-based index; anything but 0 selects alarm 1.
    pub fn from_index(index: u8) -> Self {
        if index == 0 {
            AlarmSlot::Alarm0
        } else {
            AlarmSlot::Alarm1
        }
    }

    /// The register block holding this slot's target.
    pub fn block(self) -> Block {
        match self {
            AlarmSlot::Alarm0 => Block::Alarm0,
            AlarmSlot::Alarm1 => Block::Alarm1,
        }
    }
}

/// Which fields must match for an alarm to fire (ALMxMSK).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatchMode {
    /// Seconds only: fires once a minute
    Seconds = 0b000,
    /// Minutes only: fires once an hour
    Minutes = 0b001,
    /// Hours only: fires once a day
    Hours = 0b010,
    /// Day of week only
    DayOfWeek = 0b011,
    /// Date of month only
    Date = 0b100,
    /// Seconds, minutes, hours, day of week, date and month
    All = 0b111,
}

impl From<u8> for MatchMode {
    /// Decodes the 3-bit mask. The reserved encodings `0b101` and `0b110`
    /// decode as [`MatchMode::All`].
    fn from(v: u8) -> Self {
        match v & 0b111 {
            0b000 => MatchMode::Seconds,
            0b001 => MatchMode::Minutes,
            0b010 => MatchMode::Hours,
            0b011 => MatchMode::DayOfWeek,
            0b100 => MatchMode::Date,
            _ => MatchMode::All,
        }
    }
}

impl From<MatchMode> for u8 {
    fn from(v: MatchMode) -> Self {
        v as u8
    }
}

/// Observed state of an alarm slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmState {
    /// The slot's enable bit is clear
    Disabled,
    /// Enabled and waiting for a match
    Armed,
    /// Enabled and the interrupt flag is set
    Triggered,
}

impl AlarmState {
    /// Derives the state from the slot's enable bit and interrupt flag.
    pub fn from_flags(enabled: bool, interrupt_flag: bool) -> Self {
        match (enabled, interrupt_flag) {
            (false, _) => AlarmState::Disabled,
            (true, false) => AlarmState::Armed,
            (true, true) => AlarmState::Triggered,
        }
    }
}

/// Values an alarm slot compares against, plus the mode selecting which of
/// them take part. Fields outside the mode are written but ignored by the
/// device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmTarget {
    pub mode: MatchMode,
    /// Seconds (0-59)
    pub second: u8,
    /// Minutes (0-59)
    pub minute: u8,
    /// Hours (0-23)
    pub hour: u8,
    /// Day of week (1-7)
    pub weekday: u8,
    /// Date of month (1-31)
    pub date: u8,
    /// Month (1-12)
    pub month: u8,
}

impl AlarmTarget {
    const fn unconstrained(mode: MatchMode) -> Self {
        Self {
            mode,
            second: 0,
            minute: 0,
            hour: 0,
            weekday: 1,
            date: 1,
            month: 1,
        }
    }

    /// Matches every field of `ts` except the year.
    pub fn at(ts: &Timestamp) -> Self {
        Self {
            mode: MatchMode::All,
            second: ts.second,
            minute: ts.minute,
            hour: ts.hour,
            weekday: ts.weekday,
            date: ts.day,
            month: ts.month,
        }
    }

    /// Fires on every `weekday` (1-7) at the given time. The device only
    /// compares the weekday, so the time sets the value written alongside it.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is out of range.
    pub fn on_weekday(weekday: u8, hour: u8, minute: u8, second: u8) -> Result<Self, AlarmError> {
        let target = Self {
            second,
            minute,
            hour,
            weekday,
            ..Self::unconstrained(MatchMode::DayOfWeek)
        };
        target.validate()?;
        Ok(target)
    }

    /// Fires on every `date` (1-31) of the month.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is out of range.
    pub fn on_date(date: u8, hour: u8, minute: u8, second: u8) -> Result<Self, AlarmError> {
        let target = Self {
            second,
            minute,
            hour,
            date,
            ..Self::unconstrained(MatchMode::Date)
        };
        target.validate()?;
        Ok(target)
    }

    /// Validates every field, whether or not the mode compares it.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range component.
    pub fn validate(&self) -> Result<(), AlarmError> {
        if self.second > 59 {
            return Err(AlarmError::InvalidTime("seconds must be 0-59"));
        }
        if self.minute > 59 {
            return Err(AlarmError::InvalidTime("minutes must be 0-59"));
        }
        if self.hour > 23 {
            return Err(AlarmError::InvalidTime("hours must be 0-23"));
        }
        if self.weekday == 0 || self.weekday > 7 {
            return Err(AlarmError::InvalidDayOfWeek);
        }
        if self.date == 0 || self.date > 31 {
            return Err(AlarmError::InvalidDateOfMonth);
        }
        if self.month == 0 || self.month > 12 {
            return Err(AlarmError::InvalidMonth);
        }
        Ok(())
    }

    /// Encodes the six alarm registers, seconds first.
    ///
    /// The polarity bit is carried over from `current_weekday`; the interrupt
    /// flag is written cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the target fails [`AlarmTarget::validate`].
    pub fn to_registers(&self, current_weekday: AlarmWeekDay) -> Result<[u8; 6], AlarmError> {
        self.validate()?;
        let encode =
            |field: Field, value: u8| field.encode(value).map_err(DateTimeError::from);

        let mut weekday = AlarmWeekDay::default();
        weekday.set_polarity(current_weekday.polarity());
        weekday.set_match_mode(self.mode);
        weekday.set_interrupt_flag(false);
        weekday.set_day(encode(Field::WeekDay, self.weekday)?);

        Ok([
            encode(Field::Seconds, self.second)?,
            encode(Field::Minutes, self.minute)?,
            encode(Field::Hours, self.hour)?,
            u8::from(weekday),
            encode(Field::Date, self.date)?,
            encode(Field::Month, self.month)?,
        ])
    }

    /// Decodes the six alarm registers, seconds first.
    pub fn from_registers(data: [u8; 6]) -> Self {
        let weekday = AlarmWeekDay::from(data[3]);
        Self {
            mode: weekday.match_mode(),
            second: Field::Seconds.decode(data[0]),
            minute: Field::Minutes.decode(data[1]),
            hour: Field::Hours.decode(data[2]),
            weekday: weekday.day(),
            date: Field::Date.decode(data[4]),
            month: Field::Month.decode(data[5]),
        }
    }
}

/// Target for an alarm that fires every minute at `offset` seconds.
///
/// # Errors
///
/// Returns [`AlarmError::InvalidTime`] if `offset` is greater than 59.
pub fn periodic_seconds(offset: u8) -> Result<AlarmTarget, AlarmError> {
    if offset > 59 {
        return Err(AlarmError::InvalidTime("seconds must be 0-59"));
    }
    Ok(AlarmTarget {
        second: offset,
        ..AlarmTarget::unconstrained(MatchMode::Seconds)
    })
}

/// Target for an alarm that fires every hour at `offset` minutes.
///
/// # Errors
///
/// Returns [`AlarmError::InvalidTime`] if `offset` is greater than 59.
pub fn periodic_minutes(offset: u8) -> Result<AlarmTarget, AlarmError> {
    if offset > 59 {
        return Err(AlarmError::InvalidTime("minutes must be 0-59"));
    }
    Ok(AlarmTarget {
        minute: offset,
        ..AlarmTarget::unconstrained(MatchMode::Minutes)
    })
}

/// Target for an alarm that fires every day at `offset` hours.
///
/// # Errors
///
/// Returns [`AlarmError::InvalidTime`] if `offset` is greater than 23.
pub fn periodic_hours(offset: u8) -> Result<AlarmTarget, AlarmError> {
    if offset > 23 {
        return Err(AlarmError::InvalidTime("hours must be 0-23"));
    }
    Ok(AlarmTarget {
        hour: offset,
        ..AlarmTarget::unconstrained(MatchMode::Hours)
    })
}

/// Adds `delta_seconds` to `current` for a match-all alarm.
///
/// `leap_year` decides February's length. See the module documentation for
/// the two approximations this keeps.
pub fn compute_alarm_time(current: &Timestamp, delta_seconds: u32, leap_year: bool) -> Timestamp {
    let second_part = delta_seconds % 60;
    let minute_part = (delta_seconds / 60) % 60;
    let hour_part = (delta_seconds / 3600) % 24;
    let day_part = delta_seconds / 86_400;

    let mut next = *current;

    let sum = u32::from(current.second) + second_part;
    let carry = u32::from(sum >= 60);
    next.second = (sum % 60) as u8;

    let sum = u32::from(current.minute) + minute_part + carry;
    let carry = u32::from(sum >= 60);
    next.minute = (sum % 60) as u8;

    let sum = u32::from(current.hour) + hour_part + carry;
    let carry = u32::from(sum >= 24);
    next.hour = (sum % 24) as u8;

    // weekday wraps on its own; its carry never reaches the date
    next.weekday = ((u32::from(current.weekday) + day_part + carry + 6) % 7 + 1) as u8;

    let max_day = u32::from(days_in_month(current.month, leap_year));
    let sum = u32::from(current.day) + day_part + carry;
    let carry = u32::from(sum > max_day);
    next.day = match (sum % (max_day + 1)) as u8 {
        0 => 1,
        day => day,
    };

    // no year increment past December
    next.month = ((u32::from(current.month) + carry + 11) % 12 + 1) as u8;

    debug!("alarm: {:?} + {}s -> {:?}", current, delta_seconds, next);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(year: u16, month: u8, day: u8, weekday: u8, hour: u8, minute: u8, second: u8) -> Timestamp {
        Timestamp::new(year, month, day, weekday, hour, minute, second).unwrap()
    }

    #[test]
    fn test_carry_across_month_end() {
        // Wednesday 2024-01-31 23:59:50 + 15 s
        let current = ts(2024, 1, 31, 3, 23, 59, 50);
        let next = compute_alarm_time(&current, 15, true);
        assert_eq!(next, ts(2024, 2, 1, 4, 0, 0, 5));
    }

    #[test]
    fn test_no_carry() {
        let current = ts(2024, 6, 10, 1, 8, 15, 0);
        let next = compute_alarm_time(&current, 90, false);
        assert_eq!(next, ts(2024, 6, 10, 1, 8, 16, 30));
    }

    #[test]
    fn test_hour_carry_into_next_day() {
        // Monday 2024-06-10 22:30:00 + 2 h
        let current = ts(2024, 6, 10, 1, 22, 30, 0);
        let next = compute_alarm_time(&current, 2 * 3600, false);
        assert_eq!(next, ts(2024, 6, 11, 2, 0, 30, 0));
    }

    #[test]
    fn test_weekday_wraps_sunday_to_monday() {
        let current = ts(2024, 6, 16, 7, 12, 0, 0);
        let next = compute_alarm_time(&current, 86_400, false);
        assert_eq!(next.weekday, 1);
        assert_eq!(next.day, 17);
    }

    #[test]
    fn test_multi_day_offset_within_month() {
        let current = ts(2024, 6, 10, 1, 12, 0, 0);
        let next = compute_alarm_time(&current, 3 * 86_400 + 61, false);
        assert_eq!(next, ts(2024, 6, 13, 4, 12, 1, 1));
    }

    #[test]
    fn test_month_end_clamp_lands_early() {
        // 2024-01-30 + 5 days: the wrap computes 35 % 32 = 3, so the result
        // is February 3rd rather than the calendar-correct 4th.
        let current = ts(2024, 1, 30, 2, 10, 0, 0);
        let next = compute_alarm_time(&current, 5 * 86_400, true);
        assert_eq!(next.month, 2);
        assert_eq!(next.day, 3);
        assert_eq!(next.weekday, 7);
    }

    #[test]
    fn test_exact_month_end_rollover_clamps_to_first() {
        // 2023-04-30 + 1 day: 31 % 31 = 0, clamped to the 1st
        let current = ts(2023, 4, 30, 7, 9, 0, 0);
        let next = compute_alarm_time(&current, 86_400, false);
        assert_eq!((next.month, next.day), (5, 1));
    }

    #[test]
    fn test_february_uses_leap_flag() {
        let current = ts(2024, 2, 28, 3, 23, 0, 0);
        let leap = compute_alarm_time(&current, 3600, true);
        assert_eq!((leap.month, leap.day), (2, 29));

        let not_leap = compute_alarm_time(&current, 3600, false);
        assert_eq!((not_leap.month, not_leap.day), (3, 1));
    }

    #[test]
    fn test_december_wraps_without_year_increment() {
        let current = ts(2024, 12, 31, 2, 23, 59, 59);
        let next = compute_alarm_time(&current, 1, true);
        assert_eq!(next.year, 2024);
        assert_eq!(next.month, 1);
        assert_eq!(next.day, 1);
        assert_eq!((next.hour, next.minute, next.second), (0, 0, 0));
        assert_eq!(next.weekday, 3);
    }

    #[test]
    fn test_periodic_targets() {
        let minutes = periodic_minutes(30).unwrap();
        assert_eq!(minutes.mode, MatchMode::Minutes);
        assert_eq!(minutes.minute, 30);

        let seconds = periodic_seconds(15).unwrap();
        assert_eq!(seconds.mode, MatchMode::Seconds);
        assert_eq!(seconds.second, 15);

        let hours = periodic_hours(6).unwrap();
        assert_eq!(hours.mode, MatchMode::Hours);
        assert_eq!(hours.hour, 6);
    }

    #[test]
    fn test_periodic_range_checks() {
        assert!(matches!(
            periodic_seconds(60),
            Err(AlarmError::InvalidTime(_))
        ));
        assert!(matches!(
            periodic_minutes(60),
            Err(AlarmError::InvalidTime(_))
        ));
        assert!(matches!(periodic_hours(24), Err(AlarmError::InvalidTime(_))));
        assert!(periodic_seconds(59).is_ok());
        assert!(periodic_hours(23).is_ok());
    }

    #[test]
    fn test_periodic_minutes_registers() {
        let regs = periodic_minutes(30)
            .unwrap()
            .to_registers(AlarmWeekDay::default())
            .unwrap();
        // minutes-only mask (001) in bits 6:4, minute 30 in BCD
        assert_eq!(regs, [0x00, 0x30, 0x00, 0x11, 0x01, 0x01]);
    }

    #[test]
    fn test_match_all_registers_keep_polarity() {
        let target = AlarmTarget::at(&ts(2024, 2, 1, 4, 0, 0, 5));
        // interrupt flag set and inverted polarity on the current register
        let current = AlarmWeekDay::from(0x88);
        let regs = target.to_registers(current).unwrap();
        assert_eq!(regs, [0x05, 0x00, 0x00, 0xF4, 0x01, 0x02]);
    }

    #[test]
    fn test_registers_round_trip() {
        let targets = [
            periodic_seconds(45).unwrap(),
            periodic_hours(23).unwrap(),
            AlarmTarget::on_weekday(5, 7, 30, 0).unwrap(),
            AlarmTarget::on_date(31, 12, 0, 0).unwrap(),
            AlarmTarget::at(&ts(2024, 12, 25, 3, 18, 45, 30)),
        ];
        for target in targets {
            let regs = target.to_registers(AlarmWeekDay::default()).unwrap();
            assert_eq!(AlarmTarget::from_registers(regs), target);
        }
    }

    #[test]
    fn test_target_validation() {
        assert_eq!(
            AlarmTarget::on_weekday(0, 0, 0, 0),
            Err(AlarmError::InvalidDayOfWeek)
        );
        assert_eq!(
            AlarmTarget::on_weekday(8, 0, 0, 0),
            Err(AlarmError::InvalidDayOfWeek)
        );
        assert_eq!(
            AlarmTarget::on_date(32, 0, 0, 0),
            Err(AlarmError::InvalidDateOfMonth)
        );
        assert!(matches!(
            AlarmTarget::on_date(1, 24, 0, 0),
            Err(AlarmError::InvalidTime(_))
        ));
        let bad_month = AlarmTarget {
            month: 13,
            ..AlarmTarget::at(&ts(2024, 1, 1, 1, 0, 0, 0))
        };
        assert_eq!(bad_month.validate(), Err(AlarmError::InvalidMonth));
    }

    #[test]
    fn test_match_mode_decoding() {
        assert_eq!(MatchMode::from(0b000), MatchMode::Seconds);
        assert_eq!(MatchMode::from(0b011), MatchMode::DayOfWeek);
        assert_eq!(MatchMode::from(0b100), MatchMode::Date);
        assert_eq!(MatchMode::from(0b101), MatchMode::All);
        assert_eq!(MatchMode::from(0b111), MatchMode::All);
        assert_eq!(u8::from(MatchMode::Hours), 0b010);
    }

    #[test]
    fn test_alarm_state_from_flags() {
        assert_eq!(AlarmState::from_flags(false, true), AlarmState::Disabled);
        assert_eq!(AlarmState::from_flags(true, false), AlarmState::Armed);
        assert_eq!(AlarmState::from_flags(true, true), AlarmState::Triggered);
    }

    #[test]
    fn test_slot_blocks() {
        assert_eq!(AlarmSlot::Alarm0.block(), Block::Alarm0);
        assert_eq!(AlarmSlot::Alarm1.block(), Block::Alarm1);
        assert_eq!(AlarmSlot::from_index(0), AlarmSlot::Alarm0);
        assert_eq!(AlarmSlot::from_index(1), AlarmSlot::Alarm1);
    }
}
