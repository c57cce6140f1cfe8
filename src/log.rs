//! Logging macros for the `Uauth` channel.
//!
//! Every record is emitted under the `"Uauth"` target so deployments can
//! filter the authorization server's output as one unit. Without the
//! `log` feature the macros expand to nothing.
#![allow(unused, reason = "expansion is empty without the log feature")]

macro_rules! info {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        ::log::info!(target: "Uauth", $($tt)*);
    };
}

macro_rules! debug {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        ::log::debug!(target: "Uauth", $($tt)*);
    };
}

macro_rules! warning {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        ::log::warn!(target: "Uauth", $($tt)*);
    };
}

macro_rules! error {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        ::log::error!(target: "Uauth", $($tt)*);
    };
}

pub(crate) use {info, debug, warning, error};
