//! Diagnostics routed to the `log` crate when the `logging` feature is on.
//! Without the feature the macros expand to nothing and `log` is not linked.

#![allow(unused_macros)]

/// Buffer lifecycle: allocation, release, attach and detach.
macro_rules! debug {
    ($($arg:tt)+) => (
        #[cfg(feature = "logging")]
        log::debug!(target: "flat_forward_list", $($arg)+);
    )
}

/// Per-record detail, such as why a record failed validation.
macro_rules! trace {
    ($($arg:tt)+) => (
        #[cfg(feature = "logging")]
        log::trace!(target: "flat_forward_list", $($arg)+);
    )
}
