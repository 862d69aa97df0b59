//! Metric definitions and recorder for pincer.
//!
//! Consumers record through the `metrics` crate facade, re-exported here, and
//! only when their own `metrics` cargo feature is enabled. The gateway calls
//! [`init_metrics`] once at startup; with the `prometheus` feature that
//! installs a Prometheus recorder whose text rendering is available through
//! [`MetricsHandle::render`]. Without a recorder every macro is a no-op.
//!
//! ```rust,ignore
//! use pincer_metrics::{counter, dispatch};
//!
//! counter!(dispatch::MESSAGES_HANDLED_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
