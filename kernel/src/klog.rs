//! Subsystem-tagged kernel logging
//!
//! Thin wrappers over the `log` facade. The first argument names the
//! subsystem (`"ICACHE"`, `"MOUNT"`, ...) and is used as the record target,
//! so a backend can print `[subsys][LEVEL] message` lines.

/// Log an error message
/// Format: [subsys][ERROR] message
#[macro_export]
macro_rules! log_error {
    ($subsys:expr, $($arg:tt)*) => {
        ::log::error!(target: $subsys, $($arg)*)
    };
}

/// Log a warning message
/// Format: [subsys][WARN] message
#[macro_export]
macro_rules! log_warn {
    ($subsys:expr, $($arg:tt)*) => {
        ::log::warn!(target: $subsys, $($arg)*)
    };
}

/// Log an informational message
/// Format: [subsys][INFO] message
#[macro_export]
macro_rules! log_info {
    ($subsys:expr, $($arg:tt)*) => {
        ::log::info!(target: $subsys, $($arg)*)
    };
}

/// Log a debug message
/// Format: [subsys][DEBUG] message
#[macro_export]
macro_rules! log_debug {
    ($subsys:expr, $($arg:tt)*) => {
        ::log::debug!(target: $subsys, $($arg)*)
    };
}

/// Log a trace message
/// Format: [subsys][TRACE] message
#[macro_export]
macro_rules! log_trace {
    ($subsys:expr, $($arg:tt)*) => {
        ::log::trace!(target: $subsys, $($arg)*)
    };
}

/// Log an error and halt the current control path
///
/// Used for broken invariants that cannot be continued past safely.
#[macro_export]
macro_rules! kpanic {
    ($subsys:expr, $($arg:tt)*) => {{
        $crate::log_error!($subsys, $($arg)*);
        panic!($($arg)*)
    }};
}
