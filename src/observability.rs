//! `tracing` macros shared by the crate. Events carry `component` and
//! `event` fields; no subscriber is installed here.

/// Target for all tap-parquet log events.
pub(crate) const TAP_TARGET: &str = "tap_parquet";

macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::TAP_TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::TAP_TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::TAP_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
