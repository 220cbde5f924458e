//! Logging shim.
//!
//! Routes `debug!`, `warn!` and `error!` to `defmt` or `log` depending on the
//! enabled feature. With neither feature enabled the macros expand to nothing
//! (arguments are still type-checked so call sites do not rot).

#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! error {
    ($($arg:tt)*) => { log::error!($($arg)*) };
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! debug {
    ($($arg:tt)*) => {{
        if false {
            $crate::fmt::discard(core::format_args!($($arg)*));
        }
    }};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! warn {
    ($($arg:tt)*) => {{
        if false {
            $crate::fmt::discard(core::format_args!($($arg)*));
        }
    }};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! error {
    ($($arg:tt)*) => {{
        if false {
            $crate::fmt::discard(core::format_args!($($arg)*));
        }
    }};
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
#[inline(always)]
pub(crate) fn discard(_: core::fmt::Arguments<'_>) {}
