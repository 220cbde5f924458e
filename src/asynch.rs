//! Async implementation of the MCP79412 driver.
//!
//! This module provides an async interface to the MCP79412 RTC using
//! `embedded-hal-async` traits. It is only available when the `async` feature
//! is enabled. Behaviour and bus traffic match the blocking
//! [`MCP79412`](crate::MCP79412) transaction for transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp79412::{asynch::MCP79412, AlarmSlot, DEFAULT_ADDRESS};
//!
//! let mut rtc = MCP79412::new(i2c, DEFAULT_ADDRESS);
//! rtc.begin(&mut delay).await?;
//!
//! let now = rtc.unix_time().await?;
//! rtc.set_alarm(3600, AlarmSlot::Alarm0).await?;
//! ```

use chrono::NaiveDateTime;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::{
    compute_alarm_time, periodic_hours, periodic_minutes, periodic_seconds, resolve_leap_year,
    AlarmPolarity, AlarmSlot, AlarmState, AlarmTarget, AlarmWeekDay, Block, Config, Control,
    ErrorLog, Fault, Field, MCP79412Error, Month, OscTrim, Oscillator, RawTime, RegAddr, Seconds,
    Timestamp, WeekDay, WeekdayFlag, MAX_NUM_ERRORS, OSC_START_DELAY_MS,
};

/// MCP79412 Real-Time Clock async driver.
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

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consumes the driver and returns the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn read_register(&mut self, reg: u8) -> Result<u8, MCP79412Error<I2C::Error>> {
        let mut data = [0];
        self.i2c
            .write_read(self.address, &[reg], &mut data)
            .await?;
        Ok(data[0])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), MCP79412Error<I2C::Error>> {
        self.i2c.write(self.address, &[reg, value]).await?;
        Ok(())
    }

    async fn update_register(
        &mut self,
        reg: u8,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let value = self.read_register(reg).await?;
        self.write_register(reg, f(value)).await
    }

    async fn read_flag(
        &mut self,
        block: Block,
        flag: WeekdayFlag,
    ) -> Result<bool, MCP79412Error<I2C::Error>> {
        match block.flag(flag) {
            Some((reg, mask)) => Ok(self.read_register(reg).await? & mask != 0),
            None => Ok(false),
        }
    }

    async fn write_flag(
        &mut self,
        block: Block,
        flag: WeekdayFlag,
        value: bool,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        match block.flag(flag) {
            Some((reg, mask)) => {
                self.update_register(reg, |v| if value { v | mask } else { v & !mask })
                    .await
            }
            None => Ok(()),
        }
    }

    async fn read_raw_time(&mut self) -> Result<RawTime, MCP79412Error<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)
            .await?;
        Ok(data.into())
    }

    async fn write_time(
        &mut self,
        ts: &Timestamp,
        current: &RawTime,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        ts.validate().map_err(MCP79412Error::DateTime)?;
        let raw = RawTime::from_timestamp(ts, current)
            .map_err(|e| MCP79412Error::DateTime(e.into()))?;
        debug!("MCP79412: writing time {:?}", raw);
        let data: [u8; 7] = (&raw).into();
        self.i2c
            .write(
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
            )
            .await?;
        Ok(())
    }

    /// Start-up sequence; see [`crate::MCP79412::begin`].
    ///
    /// # Returns
    /// * `Ok(true)` if the oscillator is running
    /// * `Err(MCP79412Error)` on error
    pub async fn begin<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<bool, MCP79412Error<I2C::Error>> {
        let raw = self.read_raw_time().await?;
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
            self.write_time(&fallback, &raw).await?;
        }
        if !raw.weekday().battery_backup() {
            warn!("MCP79412: battery backup was disabled, power was lost");
            self.errors.record(Fault::PowerLoss);
        }
        self.write_flag(Block::Time, WeekdayFlag::BatteryBackup, true)
            .await?;

        self.set_control(Control::default()).await?;
        self.set_osc_trim(OscTrim::default()).await?;

        if self.config.use_external_oscillator {
            self.update_register(RegAddr::Seconds as u8, |v| {
                let mut seconds = Seconds::from(v);
                seconds.set_start_oscillator(false);
                seconds.into()
            })
            .await?;
            self.update_register(RegAddr::Control as u8, |v| {
                let mut control = Control::from(v);
                control.set_oscillator(Oscillator::External);
                control.into()
            })
            .await?;
            return Ok(true);
        }

        self.update_register(RegAddr::Control as u8, |v| {
            let mut control = Control::from(v);
            control.set_oscillator(Oscillator::Crystal);
            control.into()
        })
        .await?;
        self.update_register(RegAddr::Seconds as u8, |v| {
            let mut seconds = Seconds::from(v);
            seconds.set_start_oscillator(true);
            seconds.into()
        })
        .await?;
        delay.delay_ms(OSC_START_DELAY_MS).await;
        let running = self
            .read_flag(Block::Time, WeekdayFlag::OscillatorRunning)
            .await?;
        if !running {
            error!("MCP79412: oscillator did not start");
        }
        Ok(running)
    }

    /// Reads the clock without validating it.
    pub async fn raw_time(&mut self) -> Result<Timestamp, MCP79412Error<I2C::Error>> {
        Ok(self.read_raw_time().await?.to_timestamp())
    }

    /// Reads the clock as a validated [`Timestamp`].
    pub async fn timestamp(&mut self) -> Result<Timestamp, MCP79412Error<I2C::Error>> {
        let ts = self.raw_time().await?;
        ts.validate().map_err(MCP79412Error::DateTime)?;
        Ok(ts)
    }

    /// Reads the clock as a chrono `NaiveDateTime` (UTC).
    pub async fn datetime(&mut self) -> Result<NaiveDateTime, MCP79412Error<I2C::Error>> {
        self.raw_time()
            .await?
            .to_datetime()
            .map_err(MCP79412Error::DateTime)
    }

    /// Reads the clock as seconds since the Unix epoch.
    pub async fn unix_time(&mut self) -> Result<i64, MCP79412Error<I2C::Error>> {
        Ok(self.timestamp().await?.to_unix_time())
    }

    /// Sets the clock, keeping the oscillator start bit and weekday status
    /// bits.
    pub async fn set_time(&mut self, ts: &Timestamp) -> Result<(), MCP79412Error<I2C::Error>> {
        ts.validate().map_err(MCP79412Error::DateTime)?;
        let current = self.read_raw_time().await?;
        self.write_time(ts, &current).await
    }

    /// Sets the clock from a chrono `NaiveDateTime` (UTC).
    pub async fn set_datetime(
        &mut self,
        datetime: &NaiveDateTime,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let ts = Timestamp::try_from(datetime).map_err(MCP79412Error::DateTime)?;
        self.set_time(&ts).await
    }

    pub async fn leap_year(&mut self) -> Result<bool, MCP79412Error<I2C::Error>> {
        let raw = self.read_raw_time().await?;
        Ok(resolve_leap_year(self.config.leap_year_source, &raw))
    }

    /// Sets `slot` to fire `delta_seconds` from now and returns the computed
    /// alarm time.
    pub async fn set_alarm(
        &mut self,
        delta_seconds: u32,
        slot: AlarmSlot,
    ) -> Result<Timestamp, MCP79412Error<I2C::Error>> {
        let raw = self.read_raw_time().await?;
        let now = raw.to_timestamp();
        now.validate().map_err(MCP79412Error::DateTime)?;
        let leap_year = resolve_leap_year(self.config.leap_year_source, &raw);
        let at = compute_alarm_time(&now, delta_seconds, leap_year);
        self.set_alarm_target(&AlarmTarget::at(&at), slot).await?;
        Ok(at)
    }

    pub async fn set_minute_alarm(
        &mut self,
        offset: u8,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let target = periodic_seconds(offset).map_err(MCP79412Error::Alarm)?;
        self.set_alarm_target(&target, slot).await
    }

    pub async fn set_hour_alarm(
        &mut self,
        offset: u8,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let target = periodic_minutes(offset).map_err(MCP79412Error::Alarm)?;
        self.set_alarm_target(&target, slot).await
    }

    pub async fn set_day_alarm(
        &mut self,
        offset: u8,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let target = periodic_hours(offset).map_err(MCP79412Error::Alarm)?;
        self.set_alarm_target(&target, slot).await
    }

    /// Programs `slot` with `target`: disable, burst-write the six alarm
    /// registers with the interrupt flag cleared, re-enable.
    pub async fn set_alarm_target(
        &mut self,
        target: &AlarmTarget,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        target.validate().map_err(MCP79412Error::Alarm)?;
        self.enable_alarm(false, slot).await?;

        let block = slot.block();
        let current =
            AlarmWeekDay::from(self.read_register(block.register(Field::WeekDay)).await?);
        let regs = target
            .to_registers(current)
            .map_err(MCP79412Error::Alarm)?;
        debug!("MCP79412: {:?} <- {:?} {:?}", slot, target, regs);
        self.i2c
            .write(
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
            )
            .await?;

        self.enable_alarm(true, slot).await
    }

    pub async fn alarm_target(
        &mut self,
        slot: AlarmSlot,
    ) -> Result<AlarmTarget, MCP79412Error<I2C::Error>> {
        let mut data = [0; 6];
        self.i2c
            .write_read(
                self.address,
                &[slot.block().register(Field::Seconds)],
                &mut data,
            )
            .await?;
        Ok(AlarmTarget::from_registers(data))
    }

    /// Enables or disables `slot`. The square wave output is always turned
    /// off.
    pub async fn enable_alarm(
        &mut self,
        enabled: bool,
        slot: AlarmSlot,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        let mut control = self.control().await?;
        control.set_square_wave_enable(false);
        match slot {
            AlarmSlot::Alarm0 => control.set_alarm0_enable(enabled),
            AlarmSlot::Alarm1 => control.set_alarm1_enable(enabled),
        }
        self.set_control(control).await
    }

    pub async fn clear_alarm(&mut self, slot: AlarmSlot) -> Result<(), MCP79412Error<I2C::Error>> {
        self.write_flag(slot.block(), WeekdayFlag::AlarmInterrupt, false)
            .await
    }

    pub async fn alarm_triggered(
        &mut self,
        slot: AlarmSlot,
    ) -> Result<bool, MCP79412Error<I2C::Error>> {
        self.read_flag(slot.block(), WeekdayFlag::AlarmInterrupt)
            .await
    }

    pub async fn alarm_state(
        &mut self,
        slot: AlarmSlot,
    ) -> Result<AlarmState, MCP79412Error<I2C::Error>> {
        let control = self.control().await?;
        let enabled = match slot {
            AlarmSlot::Alarm0 => control.alarm0_enable(),
            AlarmSlot::Alarm1 => control.alarm1_enable(),
        };
        let triggered = self.alarm_triggered(slot).await?;
        Ok(AlarmState::from_flags(enabled, triggered))
    }

    pub async fn set_alarm_polarity(
        &mut self,
        polarity: AlarmPolarity,
    ) -> Result<(), MCP79412Error<I2C::Error>> {
        self.write_flag(
            Block::Alarm0,
            WeekdayFlag::AlarmPolarity,
            polarity == AlarmPolarity::Inverted,
        )
        .await
    }

    pub fn errors(&self) -> &ErrorLog<MAX_NUM_ERRORS> {
        &self.errors
    }

    pub fn record_error(&mut self, code: impl Into<u32>) -> u32 {
        self.errors.record(code)
    }

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
                    pub async fn $name(&mut self) -> Result<$typ, MCP79412Error<I2C::Error>> {
                        Ok(<$typ>::from(self.read_register($regaddr as u8).await?))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), MCP79412Error<I2C::Error>> {
                        self.write_register($regaddr as u8, value.into()).await
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
