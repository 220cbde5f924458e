//! Register definitions and bitfield structures for the MCP79412 RTC.
//!
//! The device exposes three structurally similar register blocks: the
//! time-keeping block and one block per alarm. They share the BCD layout of
//! their calendar fields but reuse the high bits of the weekday register for
//! different purposes. Those per-block meanings live in [`BLOCKS`] so that
//! call sites look bits up instead of hard-coding them.

use bitfield::bitfield;

use crate::alarm::MatchMode;
use crate::bcd::{self, BcdError};
use crate::calendar::Timestamp;

/// Register addresses for the MCP79412 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegAddr {
    /// Seconds register with oscillator start bit
    Seconds = 0x00,
    /// Minutes register (0-59)
    Minutes = 0x01,
    /// Hours register (0-23)
    Hours = 0x02,
    /// Weekday register with oscillator/power/battery status bits
    WeekDay = 0x03,
    /// Date register (1-31)
    Date = 0x04,
    /// Month register with leap-year flag
    Month = 0x05,
    /// Year register (0-99)
    Year = 0x06,
    /// Control register
    Control = 0x07,
    /// Oscillator digital trim register
    OscTrim = 0x08,
    /// Alarm 0 seconds register
    Alarm0Seconds = 0x0A,
    /// Alarm 0 minutes register
    Alarm0Minutes = 0x0B,
    /// Alarm 0 hours register
    Alarm0Hours = 0x0C,
    /// Alarm 0 weekday/configuration register
    Alarm0WeekDay = 0x0D,
    /// Alarm 0 date register
    Alarm0Date = 0x0E,
    /// Alarm 0 month register
    Alarm0Month = 0x0F,
    /// Alarm 1 seconds register
    Alarm1Seconds = 0x11,
    /// Alarm 1 minutes register
    Alarm1Minutes = 0x12,
    /// Alarm 1 hours register
    Alarm1Hours = 0x13,
    /// Alarm 1 weekday/configuration register
    Alarm1WeekDay = 0x14,
    /// Alarm 1 date register
    Alarm1Date = 0x15,
    /// Alarm 1 month register
    Alarm1Month = 0x16,
}

/// Offset from the time-keeping registers to the alarm 0 block.
pub const ALARM_BLOCK_OFFSET: u8 = 0x0A;

/// Offset between the alarm 0 and alarm 1 blocks.
pub const ALARM_SLOT_OFFSET: u8 = 0x07;

/// A calendar field shared by the time-keeping and alarm blocks.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Seconds,
    Minutes,
    Hours,
    WeekDay,
    Date,
    Month,
    /// Only present in the time-keeping block.
    Year,
}

impl Field {
    /// Offset of the field from the start of its block.
    pub const fn offset(self) -> u8 {
        match self {
            Field::Seconds => 0,
            Field::Minutes => 1,
            Field::Hours => 2,
            Field::WeekDay => 3,
            Field::Date => 4,
            Field::Month => 5,
            Field::Year => 6,
        }
    }

    /// Width in bits of the BCD tens digit. The weekday has no tens digit.
    pub const fn tens_width(self) -> u8 {
        match self {
            Field::Seconds | Field::Minutes => 3,
            Field::Hours | Field::Date => 2,
            Field::Month => 1,
            Field::WeekDay => 0,
            Field::Year => 4,
        }
    }

    /// Largest decimal value the field may hold.
    pub const fn max_value(self) -> u8 {
        match self {
            Field::Seconds | Field::Minutes => 59,
            Field::Hours => 23,
            Field::WeekDay => 7,
            Field::Date => 31,
            Field::Month => 12,
            Field::Year => 99,
        }
    }

    /// Decodes the field value, ignoring any status bits sharing the byte.
    pub fn decode(self, byte: u8) -> u8 {
        match self {
            Field::WeekDay => byte & 0x07,
            _ => bcd::decode(byte, self.tens_width()),
        }
    }

    /// Encodes a field value. Only the value bits are populated.
    ///
    /// # Errors
    ///
    /// Returns [`BcdError::OutOfRange`] if the value exceeds the field's range.
    pub fn encode(self, value: u8) -> Result<u8, BcdError> {
        if value > self.max_value() {
            return Err(BcdError::OutOfRange);
        }
        match self {
            Field::WeekDay => Ok(value & 0x07),
            _ => bcd::encode(value),
        }
    }
}

/// Meaning assigned to a high bit of a block's weekday register.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WeekdayFlag {
    /// OSCRUN: oscillator is running (read-only)
    OscillatorRunning,
    /// PWRFAIL: primary power was lost
    PowerFail,
    /// VBATEN: battery backup supply enabled
    BatteryBackup,
    /// ALMxIF: the alarm matched
    AlarmInterrupt,
    /// ALMPOL: alarm output polarity (mirrored between the alarm blocks)
    AlarmPolarity,
}

/// One of the three calendar register blocks.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Block {
    Time = 0,
    Alarm0 = 1,
    Alarm1 = 2,
}

/// Static description of a register block.
#[derive(Debug, PartialEq)]
pub struct BlockDescriptor {
    /// Address of the block's seconds register.
    pub base: u8,
    /// Flags carried in the weekday register and their bit positions.
    pub weekday_flags: &'static [(WeekdayFlag, u8)],
}

impl BlockDescriptor {
    /// Bit position of `flag` in this block's weekday register.
    pub fn flag_bit(&self, flag: WeekdayFlag) -> Option<u8> {
        self.weekday_flags
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, bit)| *bit)
    }
}

const ALARM_FLAGS: &[(WeekdayFlag, u8)] = &[
    (WeekdayFlag::AlarmPolarity, 7),
    (WeekdayFlag::AlarmInterrupt, 3),
];

/// Block descriptors indexed by [`Block`].
pub const BLOCKS: [BlockDescriptor; 3] = [
    BlockDescriptor {
        base: RegAddr::Seconds as u8,
        weekday_flags: &[
            (WeekdayFlag::OscillatorRunning, 5),
            (WeekdayFlag::PowerFail, 4),
            (WeekdayFlag::BatteryBackup, 3),
        ],
    },
    BlockDescriptor {
        base: ALARM_BLOCK_OFFSET,
        weekday_flags: ALARM_FLAGS,
    },
    BlockDescriptor {
        base: ALARM_BLOCK_OFFSET + ALARM_SLOT_OFFSET,
        weekday_flags: ALARM_FLAGS,
    },
];

impl Block {
    /// The block's descriptor.
    pub fn descriptor(self) -> &'static BlockDescriptor {
        &BLOCKS[self as usize]
    }

    /// Address of `field` within this block.
    pub fn register(self, field: Field) -> u8 {
        self.descriptor().base + field.offset()
    }

    /// Address and mask of `flag` in this block's weekday register, if the
    /// block carries that flag.
    pub fn flag(self, flag: WeekdayFlag) -> Option<(u8, u8)> {
        self.descriptor()
            .flag_bit(flag)
            .map(|bit| (self.register(Field::WeekDay), 1 << bit))
    }
}

/// Oscillator source selection (EXTOSC).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// Crystal on X1/X2, started by the ST bit
    Crystal = 0,
    /// External 32.768 kHz clock on X1
    External = 1,
}
impl From<u8> for Oscillator {
    fn from(v: u8) -> Self {
        if v & 0x01 == 0 {
            Oscillator::Crystal
        } else {
            Oscillator::External
        }
    }
}
impl From<Oscillator> for u8 {
    fn from(v: Oscillator) -> Self {
        v as u8
    }
}

/// Square wave output frequency options (SQWFS).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWaveFrequency {
    /// 1 Hz square wave output
    Hz1 = 0b00,
    /// 4.096 kHz square wave output
    Hz4096 = 0b01,
    /// 8.192 kHz square wave output
    Hz8192 = 0b10,
    /// 32.768 kHz square wave output
    Hz32768 = 0b11,
}
impl From<u8> for SquareWaveFrequency {
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0b00 => SquareWaveFrequency::Hz1,
            0b01 => SquareWaveFrequency::Hz4096,
            0b10 => SquareWaveFrequency::Hz8192,
            _ => SquareWaveFrequency::Hz32768,
        }
    }
}
impl From<SquareWaveFrequency> for u8 {
    fn from(v: SquareWaveFrequency) -> Self {
        v as u8
    }
}

/// Alarm output polarity (ALMPOL).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmPolarity {
    /// MFP is driven low on a match
    Normal = 0,
    /// MFP is driven high on a match
    Inverted = 1,
}
impl From<u8> for AlarmPolarity {
    fn from(v: u8) -> Self {
        if v & 0x01 == 0 {
            AlarmPolarity::Normal
        } else {
            AlarmPolarity::Inverted
        }
    }
}
impl From<AlarmPolarity> for u8 {
    fn from(v: AlarmPolarity) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Seconds register (0-59) with oscillator start bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Seconds(u8);
    impl Debug;
    /// ST: start the crystal oscillator
    pub start_oscillator, set_start_oscillator: 7;
    /// Tens place of seconds (0-5)
    pub ten_seconds, set_ten_seconds: 6, 4;
    /// Ones place of seconds (0-9)
    pub seconds, set_seconds: 3, 0;
}
from_register_u8!(Seconds);

bitfield! {
    /// Weekday register (1-7) with status bits of the time-keeping block.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct WeekDay(u8);
    impl Debug;
    /// OSCRUN: oscillator running
    pub oscillator_running, _: 5;
    /// PWRFAIL: primary power lost
    pub power_fail, set_power_fail: 4;
    /// VBATEN: battery backup enabled
    pub battery_backup, set_battery_backup: 3;
    /// Day of week (1-7)
    pub day, set_day: 2, 0;
}
from_register_u8!(WeekDay);

bitfield! {
    /// Month register (1-12) with leap-year flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Month(u8);
    impl Debug;
    /// LPYR: the current year is a leap year (read-only)
    pub leap_year, _: 5;
    /// Tens place of month (0-1)
    pub ten_month, set_ten_month: 4, 4;
    /// Ones place of month (0-9)
    pub month, set_month: 3, 0;
}
from_register_u8!(Month);

bitfield! {
    /// Control register for device configuration.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Control(u8);
    impl Debug;
    /// OUT: MFP level when neither alarms nor square wave drive it
    pub output_level, set_output_level: 7;
    /// SQWEN: square wave output on MFP
    pub square_wave_enable, set_square_wave_enable: 6;
    /// ALM1EN: alarm 1 enabled
    pub alarm1_enable, set_alarm1_enable: 5;
    /// ALM0EN: alarm 0 enabled
    pub alarm0_enable, set_alarm0_enable: 4;
    /// EXTOSC: oscillator source
    pub from into Oscillator, oscillator, set_oscillator: 3, 3;
    /// CRSTRIM: coarse trim mode
    pub coarse_trim, set_coarse_trim: 2;
    /// SQWFS: square wave frequency
    pub from into SquareWaveFrequency, square_wave_frequency, set_square_wave_frequency: 1, 0;
}
from_register_u8!(Control);

bitfield! {
    /// Oscillator digital trim register.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct OscTrim(u8);
    impl Debug;
    /// SIGN: 1 adds clocks, 0 subtracts clocks
    pub sign, set_sign: 7;
    /// TRIMVAL: trim amount
    pub trim, set_trim: 6, 0;
}
from_register_u8!(OscTrim);

bitfield! {
    /// Alarm weekday register: match mask, interrupt flag and weekday.
    #[derive(Clone, Copy, Default, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct AlarmWeekDay(u8);
    impl Debug;
    /// ALMPOL: alarm output polarity
    pub from into AlarmPolarity, polarity, set_polarity: 7, 7;
    /// ALMxMSK: fields compared for a match
    pub from into MatchMode, match_mode, set_match_mode: 6, 4;
    /// ALMxIF: the alarm matched
    pub interrupt_flag, set_interrupt_flag: 3;
    /// Day of week (1-7)
    pub day, set_day: 2, 0;
}
from_register_u8!(AlarmWeekDay);

/// The seven time-keeping registers as read from the device.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawTime(pub [u8; 7]);

impl RawTime {
    fn field(&self, field: Field) -> u8 {
        field.decode(self.0[field.offset() as usize])
    }

    /// Decodes the registers without validating the calendar values.
    pub fn to_timestamp(&self) -> Timestamp {
        Timestamp {
            year: 2000 + u16::from(self.field(Field::Year)),
            month: self.field(Field::Month),
            day: self.field(Field::Date),
            weekday: self.field(Field::WeekDay),
            hour: self.field(Field::Hours),
            minute: self.field(Field::Minutes),
            second: self.field(Field::Seconds),
        }
    }

    /// Encodes `ts`, carrying over the oscillator start bit and the weekday
    /// status bits from `current`. The read-only LPYR bit is never written.
    ///
    /// # Errors
    ///
    /// Returns [`BcdError::OutOfRange`] if a field does not fit its register.
    pub fn from_timestamp(ts: &Timestamp, current: &RawTime) -> Result<Self, BcdError> {
        let year = ts
            .year
            .checked_sub(2000)
            .and_then(|y| u8::try_from(y).ok())
            .ok_or(BcdError::OutOfRange)?;

        let mut seconds = Seconds(Field::Seconds.encode(ts.second)?);
        seconds.set_start_oscillator(Seconds(current.0[0]).start_oscillator());

        let mut weekday = WeekDay(current.0[Field::WeekDay.offset() as usize] & 0xF8);
        weekday.set_day(Field::WeekDay.encode(ts.weekday)?);

        Ok(RawTime([
            seconds.0,
            Field::Minutes.encode(ts.minute)?,
            Field::Hours.encode(ts.hour)?,
            weekday.0,
            Field::Date.encode(ts.day)?,
            Field::Month.encode(ts.month)?,
            Field::Year.encode(year)?,
        ]))
    }

    /// The oscillator start bit.
    pub fn start_oscillator(&self) -> bool {
        Seconds(self.0[0]).start_oscillator()
    }

    /// The weekday register with its status bits.
    pub fn weekday(&self) -> WeekDay {
        WeekDay(self.0[Field::WeekDay.offset() as usize])
    }

    /// The month register with its leap-year flag.
    pub fn month(&self) -> Month {
        Month(self.0[Field::Month.offset() as usize])
    }
}

impl From<[u8; 7]> for RawTime {
    fn from(data: [u8; 7]) -> Self {
        RawTime(data)
    }
}

impl From<&RawTime> for [u8; 7] {
    fn from(raw: &RawTime) -> [u8; 7] {
        raw.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_map_matches_block_table() {
        assert_eq!(Block::Time.register(Field::Seconds), RegAddr::Seconds as u8);
        assert_eq!(Block::Time.register(Field::Year), RegAddr::Year as u8);
        assert_eq!(
            Block::Alarm0.register(Field::Seconds),
            RegAddr::Alarm0Seconds as u8
        );
        assert_eq!(
            Block::Alarm0.register(Field::WeekDay),
            RegAddr::Alarm0WeekDay as u8
        );
        assert_eq!(
            Block::Alarm0.register(Field::Month),
            RegAddr::Alarm0Month as u8
        );
        assert_eq!(
            Block::Alarm1.register(Field::Seconds),
            RegAddr::Alarm1Seconds as u8
        );
        assert_eq!(
            Block::Alarm1.register(Field::WeekDay),
            RegAddr::Alarm1WeekDay as u8
        );
        assert_eq!(
            Block::Alarm1.register(Field::Month),
            RegAddr::Alarm1Month as u8
        );
    }

    #[test]
    fn test_weekday_flags_per_block() {
        assert_eq!(
            Block::Time.flag(WeekdayFlag::BatteryBackup),
            Some((0x03, 0x08))
        );
        assert_eq!(
            Block::Time.flag(WeekdayFlag::OscillatorRunning),
            Some((0x03, 0x20))
        );
        assert_eq!(Block::Time.flag(WeekdayFlag::PowerFail), Some((0x03, 0x10)));
        assert_eq!(Block::Time.flag(WeekdayFlag::AlarmInterrupt), None);

        assert_eq!(
            Block::Alarm0.flag(WeekdayFlag::AlarmInterrupt),
            Some((0x0D, 0x08))
        );
        assert_eq!(
            Block::Alarm1.flag(WeekdayFlag::AlarmInterrupt),
            Some((0x14, 0x08))
        );
        assert_eq!(
            Block::Alarm0.flag(WeekdayFlag::AlarmPolarity),
            Some((0x0D, 0x80))
        );
        assert_eq!(Block::Alarm1.flag(WeekdayFlag::BatteryBackup), None);
    }

    #[test]
    fn test_field_encode_limits() {
        assert_eq!(Field::Seconds.encode(59), Ok(0x59));
        assert_eq!(Field::Seconds.encode(60), Err(BcdError::OutOfRange));
        assert_eq!(Field::Hours.encode(23), Ok(0x23));
        assert_eq!(Field::Hours.encode(24), Err(BcdError::OutOfRange));
        assert_eq!(Field::Month.encode(12), Ok(0x12));
        assert_eq!(Field::Month.encode(13), Err(BcdError::OutOfRange));
        assert_eq!(Field::WeekDay.encode(7), Ok(0x07));
        assert_eq!(Field::WeekDay.encode(8), Err(BcdError::OutOfRange));
        assert_eq!(Field::Year.encode(99), Ok(0x99));
    }

    #[test]
    fn test_field_decode_ignores_status_bits() {
        assert_eq!(Field::Seconds.decode(0x80 | 0x45), 45);
        assert_eq!(Field::WeekDay.decode(0x28 | 0x04), 4);
        assert_eq!(Field::Month.decode(0x20 | 0x12), 12);
        assert_eq!(Field::Hours.decode(0x40 | 0x23), 23);
    }

    #[test]
    fn test_raw_time_decode() {
        // 2024-03-14 15:30:05 Thursday, oscillator running, battery enabled, leap year
        let raw = RawTime::from([0x85, 0x30, 0x15, 0x2C, 0x14, 0x23, 0x24]);
        let ts = raw.to_timestamp();
        assert_eq!(ts, Timestamp::new(2024, 3, 14, 4, 15, 30, 5).unwrap());
        assert!(raw.start_oscillator());
        assert!(raw.weekday().oscillator_running());
        assert!(raw.weekday().battery_backup());
        assert!(raw.month().leap_year());
    }

    #[test]
    fn test_raw_time_encode_preserves_status_bits() {
        let current = RawTime::from([0x80, 0x00, 0x00, 0x29, 0x01, 0x21, 0x00]);
        let ts = Timestamp::new(2023, 12, 31, 7, 23, 59, 58).unwrap();
        let raw = RawTime::from_timestamp(&ts, &current).unwrap();
        let bytes: [u8; 7] = (&raw).into();
        assert_eq!(bytes, [0xD8, 0x59, 0x23, 0x2F, 0x31, 0x12, 0x23]);
    }

    #[test]
    fn test_raw_time_encode_rejects_year() {
        let ts = Timestamp {
            year: 2100,
            month: 1,
            day: 1,
            weekday: 5,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert_eq!(
            RawTime::from_timestamp(&ts, &RawTime::default()),
            Err(BcdError::OutOfRange)
        );
    }

    #[test]
    fn test_control_register_conversions() {
        let mut control = Control::default();
        control.set_alarm0_enable(true);
        control.set_oscillator(Oscillator::External);
        control.set_square_wave_frequency(SquareWaveFrequency::Hz8192);
        assert_eq!(u8::from(control), 0b0001_1010);

        let control = Control::from(0b1110_0111);
        assert!(control.output_level());
        assert!(control.square_wave_enable());
        assert!(control.alarm1_enable());
        assert!(!control.alarm0_enable());
        assert_eq!(control.oscillator(), Oscillator::Crystal);
        assert!(control.coarse_trim());
        assert_eq!(
            control.square_wave_frequency(),
            SquareWaveFrequency::Hz32768
        );
    }

    #[test]
    fn test_alarm_weekday_register_conversions() {
        let mut reg = AlarmWeekDay::default();
        reg.set_match_mode(MatchMode::All);
        reg.set_day(3);
        reg.set_polarity(AlarmPolarity::Inverted);
        assert_eq!(u8::from(reg), 0xF3);

        let reg = AlarmWeekDay::from(0x1D);
        assert_eq!(reg.match_mode(), MatchMode::Minutes);
        assert!(reg.interrupt_flag());
        assert_eq!(reg.day(), 5);
        assert_eq!(reg.polarity(), AlarmPolarity::Normal);
    }

    #[test]
    fn test_osc_trim_register() {
        let mut trim = OscTrim::default();
        trim.set_sign(true);
        trim.set_trim(0x12);
        assert_eq!(u8::from(trim), 0x92);
    }
}
