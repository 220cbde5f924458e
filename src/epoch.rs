//! Calendar to Unix time conversion.
//!
//! Uses the integer Julian Day Number formula published by Fliegel and
//! Van Flandern (Communications of the ACM, October 1968). Every division in
//! the formula truncates toward zero, which is what Rust's `/` does for
//! signed integers, so the expression can be used exactly as published.

/// Julian Day Number of 1970-01-01.
pub const UNIX_EPOCH_JDN: i64 = 2_440_588;

/// Seconds in one civil day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Julian Day Number of a Gregorian calendar date.
pub const fn julian_day_number(year: i64, month: i64, day: i64) -> i64 {
    let a = (month - 14) / 12;
    day - 32075 + 1461 * (year + 4800 + a) / 4 + 367 * (month - 2 - a * 12) / 12
        - 3 * ((year + 4900 + a) / 100) / 4
}

/// Seconds since 1970-01-01T00:00:00Z for the given UTC calendar time.
///
/// Inputs are expected to be range-checked already; see
/// [`Timestamp::validate`](crate::Timestamp::validate).
pub const fn to_unix_time(
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
) -> i64 {
    let days = julian_day_number(year, month, day) - UNIX_EPOCH_JDN;
    days * SECONDS_PER_DAY + hour * 3600 + minute * 60 + second
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_epoch_is_zero() {
        assert_eq!(julian_day_number(1970, 1, 1), UNIX_EPOCH_JDN);
        assert_eq!(to_unix_time(1970, 1, 1, 0, 0, 0), 0);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(to_unix_time(2000, 1, 1, 0, 0, 0), 946_684_800);
        assert_eq!(to_unix_time(2024, 3, 1, 0, 0, 0), 1_709_251_200);
        assert_eq!(to_unix_time(2024, 2, 29, 12, 0, 0), 1_709_208_000);
        assert_eq!(to_unix_time(2038, 1, 19, 3, 14, 8), 2_147_483_648);
    }

    #[test]
    fn test_agrees_with_chrono() {
        let samples = [
            (2000, 2, 29, 23, 59, 59),
            (2001, 1, 1, 0, 0, 0),
            (2022, 12, 31, 12, 30, 45),
            (2024, 1, 31, 23, 59, 50),
            (2050, 7, 4, 6, 7, 8),
            (2099, 12, 31, 23, 59, 59),
        ];
        for (y, mo, d, h, mi, s) in samples {
            let expected = NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap()
                .and_utc()
                .timestamp();
            let actual = to_unix_time(
                i64::from(y),
                i64::from(mo),
                i64::from(d),
                i64::from(h),
                i64::from(mi),
                i64::from(s),
            );
            assert_eq!(actual, expected, "{y}-{mo}-{d} {h}:{mi}:{s}");
        }
    }

    #[test]
    fn test_every_day_from_2000_is_consecutive() {
        let mut previous = to_unix_time(1999, 12, 31, 0, 0, 0);
        for year in 2000..2100 {
            let leap = crate::calendar::is_leap_year(year as u16);
            for month in 1..=12u8 {
                for day in 1..=crate::calendar::days_in_month(month, leap) {
                    let now = to_unix_time(year, i64::from(month), i64::from(day), 0, 0, 0);
                    assert_eq!(now - previous, SECONDS_PER_DAY);
                    previous = now;
                }
            }
        }
    }

    #[test]
    fn test_monotonic_in_each_field() {
        let base = to_unix_time(2024, 6, 15, 10, 20, 30);
        assert!(to_unix_time(2025, 6, 15, 10, 20, 30) > base);
        assert!(to_unix_time(2024, 7, 15, 10, 20, 30) > base);
        assert!(to_unix_time(2024, 6, 16, 10, 20, 30) > base);
        assert!(to_unix_time(2024, 6, 15, 11, 20, 30) > base);
        assert!(to_unix_time(2024, 6, 15, 10, 21, 30) > base);
        assert!(to_unix_time(2024, 6, 15, 10, 20, 31) > base);
    }
}
