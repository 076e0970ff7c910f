//! Logging macros.
//!
//! With the `log` feature statements go to the `log` facade, with
//! `esp32-log` they are printed through `esp-println`. Without either
//! feature the arguments are type-checked and dropped.

#![allow(unused_macros)]

macro_rules! __emit {
    ($level:ident, $tag:literal, $($arg:tt)*) => {{
        #[cfg(feature = "log")]
        ::log::$level!($($arg)*);
        #[cfg(all(feature = "esp32-log", not(feature = "log")))]
        ::esp_println::println!(concat!("[", $tag, "] {}"), format_args!($($arg)*));
        #[cfg(not(any(feature = "log", feature = "esp32-log")))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => { __emit!(trace, "TRACE", $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { __emit!(debug, "DEBUG", $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { __emit!(info, "INFO", $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { __emit!(warn, "WARN", $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { __emit!(error, "ERROR", $($arg)*) };
}
