//! Logging macros that capture the call site.
//!
//! Each macro formats its arguments like `format!` and hands the result to the
//! active logger in [`crate::logging`] together with `file!()` and `line!()`.

/// Log an `Error` message.
#[macro_export]
macro_rules! lj_error {
    ($($arg:tt)+) => {
        $crate::logging::log_message(
            $crate::Level::Error,
            &::std::format!($($arg)+),
            ::std::file!(),
            ::std::line!(),
            true,
        )
    };
}

/// Log a `Warning` message.
#[macro_export]
macro_rules! lj_warning {
    ($($arg:tt)+) => {
        $crate::logging::log_message(
            $crate::Level::Warning,
            &::std::format!($($arg)+),
            ::std::file!(),
            ::std::line!(),
            true,
        )
    };
}

/// Log an `Info` message.
#[macro_export]
macro_rules! lj_info {
    ($($arg:tt)+) => {
        $crate::logging::log_message(
            $crate::Level::Info,
            &::std::format!($($arg)+),
            ::std::file!(),
            ::std::line!(),
            true,
        )
    };
}

/// Log a `Debug` message. Compiled out, arguments included, without
/// `debug_assertions`.
#[macro_export]
macro_rules! lj_debug {
    ($($arg:tt)+) => {{
        #[cfg(debug_assertions)]
        $crate::logging::log_message(
            $crate::Level::Debug,
            &::std::format!($($arg)+),
            ::std::file!(),
            ::std::line!(),
            true,
        );
    }};
}

/// Log an `Error` message when `cond` holds.
#[macro_export]
macro_rules! lj_error_if {
    ($cond:expr, $($arg:tt)+) => {
        if $cond {
            $crate::lj_error!($($arg)+);
        }
    };
}

/// Log a `Warning` message when `cond` holds.
#[macro_export]
macro_rules! lj_warning_if {
    ($cond:expr, $($arg:tt)+) => {
        if $cond {
            $crate::lj_warning!($($arg)+);
        }
    };
}
