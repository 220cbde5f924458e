//! A platform-agnostic driver for the MCP79412 real-time clock.
//!
//! The MCP79412 is a battery-backed RTC with two independent alarms. This
//! crate talks to it through the `embedded-hal` 1.0 I2C traits and keeps all
//! calendar handling in integer arithmetic, without a host calendar or
//! floating point.
//!
//! # Features
//!
//! - Reading and setting the time as a [`Timestamp`] or a chrono
//!   `NaiveDateTime`
//! - Unix time of the current clock value ([`epoch`])
//! - Relative alarms ("N seconds from now") and periodic alarms (every
//!   minute, hour or day at an offset) on either alarm slot ([`alarm`])
//! - A bounded log of faults detected at start-up ([`error_log`])
//! - Optional async support via `embedded-hal-async` (feature `async`)
//! - Optional logging through `log` or `defmt` (features `log`, `defmt`)
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp79412::{AlarmSlot, MCP79412, DEFAULT_ADDRESS};
//!
//! let mut rtc = MCP79412::new(i2c, DEFAULT_ADDRESS);
//! let running = rtc.begin(&mut delay)?;
//!
//! // wake up in ten minutes
//! let target = rtc.set_alarm(600, AlarmSlot::Alarm0)?;
//!
//! // and at half past every hour
//! rtc.set_hour_alarm(30, AlarmSlot::Alarm1)?;
//!
//! if rtc.alarm_triggered(AlarmSlot::Alarm0)? {
//!     rtc.clear_alarm(AlarmSlot::Alarm0)?;
//! }
//! ```
//!
//! # Concurrency
//!
//! The driver owns its bus and its error log. Every method blocks for one or
//! more complete bus transactions; callers sharing a driver between contexts
//! must serialise access themselves.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod alarm;
pub mod bcd;
pub mod calendar;
pub mod epoch;
pub mod error_log;
pub mod registers;

cfg_if::cfg_if! {
    if #[cfg(feature = "async")] {
        pub mod asynch;
    }
}

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use paste::paste;

pub use alarm::{
    compute_alarm_time, periodic_hours, periodic_minutes, periodic_seconds, AlarmError,
    AlarmSlot, AlarmState, AlarmTarget, MatchMode,
};
pub use calendar::{days_in_month, is_leap_year, DateTimeError, LeapYearSource, Timestamp};
pub use epoch::to_unix_time;
pub use error_log::{ErrorLog, Fault, MAX_NUM_ERRORS};
pub use registers::{
    AlarmPolarity, AlarmWeekDay, Block, Control, Field, Month, OscTrim, Oscillator, RawTime,
    RegAddr, Seconds, SquareWaveFrequency, WeekDay, WeekdayFlag,
};

/// Fixed I2C address of the RTC registers.
pub const DEFAULT_ADDRESS: u8 = 0x6F;

/// Time allowed for the crystal to start before OSCRUN is checked.
pub const OSC_START_DELAY_MS: u32 = 5;

/// Configuration for the MCP79412 driver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Source of truth for February's length in alarm arithmetic
    pub leap_year_source: LeapYearSource,
    /// Clock values before this year are recorded as [`Fault::AncientTime`]
    pub trusted_year_floor: u16,
    /// Written by [`MCP79412::begin`] when the clock holds a non-real time
    pub fallback_time: Timestamp,
    /// Use an external clock on X1 instead of starting the crystal
    pub use_external_oscillator: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            leap_year_source: LeapYearSource::Device,
            trusted_year_floor: 2022,
            // Monday 2001-01-01 00:00:00
            fallback_time: Timestamp {
                year: 2001,
                month: 1,
                day: 1,
                weekday: 1,
                hour: 0,
                minute: 0,
                second: 0,
            },
            use_external_oscillator: false,
        }
    }
}

/// Error type for MCP79412 operations.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MCP79412Error<I2CE> {
    /// I2C bus error
    I2c(I2CE),
    /// The clock holds, or was asked to hold, an invalid date/time
    DateTime(DateTimeError),
    /// Invalid alarm configuration
    Alarm(AlarmError),
}

impl<I2CE> From<I2CE> for MCP79412Error<I2CE> {
    fn from(e: I2CE) -> Self {
        MCP79412Error::I2c(e)
    }
}

/// Picks February's length from the device flag or the Gregorian rule and
/// reports when the two disagree.
pub(crate) fn resolve_leap_year(source: LeapYearSource, raw: &RawTime) -> bool {
    let device = raw.month().leap_year();
    let computed = is_leap_year(raw.to_timestamp().year);
    if device != computed {
        warn!(
            "MCP79412: LPYR={} disagrees with computed leap year={}",
            device, computed
        );
    }
    match source {
        LeapYearSource::Device => device,
        LeapYearSource::Computed => computed,
    }
}

/// MCP79412 Real-Time Clock driver.
pub struct MCP79412<I2C: I2c> {
    i2c: I2C,
    address: u8,
    config: Config,
    errors: ErrorLog<MAX_NUM_ERRORS>,
}

impl<I2C: I2c> MCP79412<I2C> {
    /// Creates a driver with the default [`Config`]. No bus traffic.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self::with_config(i2c, address, Config::default())
    }

    /// Creates a driver with an explicit configuration. No bus traffic.
    pub fn with_config(i2c: I2C, address: u8, config: Config) -> Self {
        Self {
            i2c,
            address,
            config,
            errors: ErrorLog::new(),
        }
    }

    /// The driver configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consumes the driver and returns the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, MCP79412Error<I2C::Error>> {
        let mut data = [0];
        self.i2c.write_read(self.address, &[reg], &mut data)?;
        Ok(data[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), MCP79412Error<I2C::Error>> {
        self.i2c.write(self.address, &[reg, value])?;
        Ok(())
    }

    fn update_register(
        &mut self,
        reg: u8,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let value = self.read_register(reg)?;
        self.write_register(reg, f(value))
    }

    fn read_flag(&mut self, block: Block, flag: WeekdayFlag) -> Result<bool, MCP79412Error<I2C::Error>> {
        match block.flag(flag) {
            Some((reg, mask)) => Ok(self.read_register(reg)? & mask != 0),
            None => Ok(false),
        }
    }

    fn write_flag(
        &mut self,
        block: Block,
        flag: WeekdayFlag,
        value: bool,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        match block.flag(flag) {
            Some((reg, mask)) => {
                self.update_register(reg, |v| if value { v | mask } else { v & !mask })
            }
            None => Ok(()),
        }
    }

    fn read_raw_time(&mut self) -> Result<RawTime, MCP79412Error<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)?;
        Ok(data.into())
    }

    fn write_raw_time(&mut self, raw: &RawTime) -> Result<(), MCP79412Error<I2C::Error>> {
        let data: [u8; 7] = raw.into();
        self.i2c.write(
            self.address,
            &[
                RegAddr::Seconds as u8,
                data[0],
                data[1],
                data[2],
                data[3],
                data[4],
                data[5],
                data[6],
            ],
        )?;
        Ok(())
    }

    fn write_time(
        &mut self,
        ts: &Timestamp,
        current: &RawTime,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        ts.validate().map_err(MCP79412Error::DateTime)?;
        let raw = RawTime::from_timestamp(ts, current)
            .map_err(|e| MCP79412Error::DateTime(e.into()))?;
        debug!("MCP79412: writing time {:?}", raw);
        self.write_raw_time(&raw)
    }

    /// Start-up sequence.
    ///
    /// Checks the stored time and battery state, recording
    /// [`Fault::AncientTime`], [`Fault::NonRealTime`] and [`Fault::PowerLoss`]
    /// in the error log as they are found. A non-real time is replaced with
    /// [`Config::fallback_time`] so alarm arithmetic has a valid base. Then
    /// enables the battery backup, clears the control and trim registers and
    /// starts the oscillator.
    ///
    /// # Returns
    /// * `Ok(true)` if the oscillator is running (always `true` with an
    ///   external oscillator once the bus writes succeed)
    /// * `Err(MCP79412Error)` on error
    pub fn begin<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, MCP79412Error<I2C::Error>> {
        let raw = self.read_raw_time()?;
        let now = raw.to_timestamp();
        debug!("MCP79412: time at start-up {:?}", now);

        if now.year < self.config.trusted_year_floor {
            warn!("MCP79412: clock year {} predates trusted floor", now.year);
            self.errors.record(Fault::AncientTime);
        }
        if !now.is_real() {
            warn!("MCP79412: clock holds a non-real time, writing fallback");
            self.errors.record(Fault::NonRealTime);
            let fallback = self.config.fallback_time;
            self.write_time(&fallback, &raw)?;
        }
        if !raw.weekday().battery_backup() {
            warn!("MCP79412: battery backup was disabled, power was lost");
            self.errors.record(Fault::PowerLoss);
        }
        self.write_flag(Block::Time, WeekdayFlag::BatteryBackup, true)?;

        self.set_control(Control::default())?;
        self.set_osc_trim(OscTrim::default())?;

        if self.config.use_external_oscillator {
            self.update_register(RegAddr::Seconds as u8, |v| {
                let mut seconds = Seconds::from(v);
                seconds.set_start_oscillator(false);
                seconds.into()
            })?;
            self.update_register(RegAddr::Control as u8, |v| {
                let mut control = Control::from(v);
                control.set_oscillator(Oscillator::External);
                control.into()
            })?;
            Ok(true)
        } else {
            self.start_oscillator(delay)
        }
    }

    fn start_oscillator<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<bool, MCP79412Error<I2C::Error>> {
        self.update_register(RegAddr::Control as u8, |v| {
            let mut control = Control::from(v);
            control.set_oscillator(Oscillator::Crystal);
            control.into()
        })?;
        self.update_register(RegAddr::Seconds as u8, |v| {
            let mut seconds = Seconds::from(v);
            seconds.set_start_oscillator(true);
            seconds.into()
        })?;
        delay.delay_ms(OSC_START_DELAY_MS);
        let running = self.read_flag(Block::Time, WeekdayFlag::OscillatorRunning)?;
        if !running {
            error!("MCP79412: oscillator did not start");
        }
        Ok(running)
    }

    /// Reads the clock without validating it. The device can hold values such
    /// as month 0 that are not real dates.
    pub fn raw_time(&mut self) -> Result<Timestamp, MCP79412Error<I2C::Error>> {
        Ok(self.read_raw_time()?.to_timestamp())
    }

    /// Reads the clock as a validated [`Timestamp`].
    pub fn timestamp(&mut self) -> Result<Timestamp, MCP79412Error<I2C::Error>> {
        let ts = self.raw_time()?;
        ts.validate().map_err(MCP79412Error::DateTime)?;
        Ok(ts)
    }

    /// Reads the clock as a chrono `NaiveDateTime` (UTC).
    pub fn datetime(&mut self) -> Result<NaiveDateTime, MCP79412Error<I2C::Error>> {
        self.raw_time()?
            .to_datetime()
            .map_err(MCP79412Error::DateTime)
    }

    /// Reads the clock as seconds since the Unix epoch.
    pub fn unix_time(&mut self) -> Result<i64, MCP79412Error<I2C::Error>> {
        Ok(self.timestamp()?.to_unix_time())
    }

    /// Sets the clock. The oscillator start bit and the weekday status bits
    /// keep their current values.
    pub fn set_time(&mut self, ts: &Timestamp) -> Result<(), MCP79412Error<I2C::Error>> {
        ts.validate().map_err(MCP79412Error::DateTime)?;
        let current = self.read_raw_time()?;
        self.write_time(ts, &current)
    }

    /// Sets the clock from a chrono `NaiveDateTime` (UTC).
    pub fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let ts = Timestamp::try_from(datetime).map_err(MCP79412Error::DateTime)?;
        self.set_time(&ts)
    }

    /// Whether February currently has 29 days, per
    /// [`Config::leap_year_source`].
    pub fn leap_year(&mut self) -> Result<bool, MCP79412Error<I2C::Error>> {
        let raw = self.read_raw_time()?;
        Ok(resolve_leap_year(self.config.leap_year_source, &raw))
    }

    /// Sets `slot` to fire `delta_seconds` from now, matching every field.
    ///
    /// # Returns
    /// * `Ok(Timestamp)` - the computed alarm time (its year is the current
    ///   year; see [`compute_alarm_time`])
    /// * `Err(MCP79412Error)` on error; the slot's configuration is then
    ///   unknown and the call should be retried
    pub fn set_alarm(
        &mut self,
        delta_seconds: u32,
        slot: AlarmSlot,
    ) -> Result<Timestamp, MCP79412Error<I2C::Error>> {
        let raw = self.read_raw_time()?;
        let now = raw.to_timestamp();
        now.validate().map_err(MCP79412Error::DateTime)?;
        let leap_year = resolve_leap_year(self.config.leap_year_source, &raw);
        let at = compute_alarm_time(&now, delta_seconds, leap_year);
        self.set_alarm_target(&AlarmTarget::at(&at), slot)?;
        Ok(at)
    }

    /// Fires every minute at `offset` seconds past the minute.
    pub fn set_minute_alarm(
        &mut self,
        offset: u8,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let target = periodic_seconds(offset).map_err(MCP79412Error::Alarm)?;
        self.set_alarm_target(&target, slot)
    }

    /// Fires every hour at `offset` minutes past the hour.
    pub fn set_hour_alarm(
        &mut self,
        offset: u8,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let target = periodic_minutes(offset).map_err(MCP79412Error::Alarm)?;
        self.set_alarm_target(&target, slot)
    }

    /// Fires every day at hour `offset`.
    pub fn set_day_alarm(
        &mut self,
        offset: u8,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let target = periodic_hours(offset).map_err(MCP79412Error::Alarm)?;
        self.set_alarm_target(&target, slot)
    }

    /// Programs `slot` with `target`.
    ///
    /// The slot is disabled, its six registers are written with the interrupt
    /// flag cleared, and it is re-enabled with the square wave output off.
    pub fn set_alarm_target(
        &mut self,
        target: &AlarmTarget,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        target.validate().map_err(MCP79412Error::Alarm)?;
        self.enable_alarm(false, slot)?;

        let block = slot.block();
        let current = AlarmWeekDay::from(self.read_register(block.register(Field::WeekDay))?);
        let regs = target
            .to_registers(current)
            .map_err(MCP79412Error::Alarm)?;
        debug!("MCP79412: {:?} <- {:?} {:?}", slot, target, regs);
        self.i2c.write(
            self.address,
            &[
                block.register(Field::Seconds),
                regs[0],
                regs[1],
                regs[2],
                regs[3],
                regs[4],
                regs[5],
            ],
        )?;

        self.enable_alarm(true, slot)
    }

    /// Reads back the target programmed into `slot`.
    pub fn alarm_target(&mut self, slot: AlarmSlot) -> Result<AlarmTarget, MCP79412Error<I2C::Error>> {
        let mut data = [0; 6];
        self.i2c.write_read(
            self.address,
            &[slot.block().register(Field::Seconds)],
            &mut data,
        )?;
        Ok(AlarmTarget::from_registers(data))
    }

    /// Enables or disables `slot`. The square wave output is always turned
    /// off, since it shares the MFP pin with the alarms.
    pub fn enable_alarm(
        &mut self,
        enabled: bool,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let mut control = self.control()?;
        control.set_square_wave_enable(false);
        match slot {
            AlarmSlot::Alarm0 => control.set_alarm0_enable(enabled),
            AlarmSlot::Alarm1 => control.set_alarm1_enable(enabled),
        }
        self.set_control(control)
    }

    /// Clears the interrupt flag of `slot`.
    pub fn clear_alarm(&mut self, slot: AlarmSlot) -> Result<(), MCP79412Error<I2C::Error>> {
        self.write_flag(slot.block(), WeekdayFlag::AlarmInterrupt, false)
    }

    /// Reads the interrupt flag of `slot`.
    pub fn alarm_triggered(&mut self, slot: AlarmSlot) -> Result<bool, MCP79412Error<I2C::Error>> {
        self.read_flag(slot.block(), WeekdayFlag::AlarmInterrupt)
    }

    /// Reads the enable bit and interrupt flag of `slot`.
    pub fn alarm_state(&mut self, slot: AlarmSlot) -> Result<AlarmState, MCP79412Error<I2C::Error>> {
        let control = self.control()?;
        let enabled = match slot {
            AlarmSlot::Alarm0 => control.alarm0_enable(),
            AlarmSlot::Alarm1 => control.alarm1_enable(),
        };
        let triggered = self.alarm_triggered(slot)?;
        Ok(AlarmState::from_flags(enabled, triggered))
    }

    /// Sets the alarm output polarity. The device mirrors the bit into the
    /// alarm 1 block.
    pub fn set_alarm_polarity(
        &mut self,
        polarity: AlarmPolarity,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        self.write_flag(
            Block::Alarm0,
            WeekdayFlag::AlarmPolarity,
            polarity == AlarmPolarity::Inverted,
        )
    }

    /// Faults recorded since the last drain.
    pub fn errors(&self) -> &ErrorLog<MAX_NUM_ERRORS> {
        &self.errors
    }

    /// Records an application fault code in the driver's log.
    pub fn record_error(&mut self, code: impl Into<u32>) -> u32 {
        self.errors.record(code)
    }

    /// Drains the error log into `out`; see [`ErrorLog::drain`].
    pub fn drain_errors(&mut self, out: &mut [u32; MAX_NUM_ERRORS]) -> u32 {
        self.errors.drain(out)
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> MCP79412<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, MCP79412Error<I2C::Error>> {
                        Ok(<$typ>::from(self.read_register($regaddr as u8)?))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), MCP79412Error<I2C::Error>> {
                        self.write_register($regaddr as u8, value.into())
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (seconds, RegAddr::Seconds, Seconds),
    (weekday, RegAddr::WeekDay, WeekDay),
    (month, RegAddr::Month, Month),
    (control, RegAddr::Control, Control),
    (osc_trim, RegAddr::OscTrim, OscTrim),
    (alarm0_weekday, RegAddr::Alarm0WeekDay, AlarmWeekDay),
    (alarm1_weekday, RegAddr::Alarm1WeekDay, AlarmWeekDay)
);
