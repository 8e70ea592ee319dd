// SPDX-License-Identifier: Apache-2.0

//! Debug observability for the gate.
//!
//! The gate reports each sleep through an injected [`DebugSink`] rather than a
//! process-wide logger. [`LogSink`] forwards to the `log` facade.

use std::fmt;

/// Receives debug records from the gate.
pub trait DebugSink {
    /// Returns whether debug records are wanted. Callers skip building fields
    /// when this is false.
    fn enabled(&self) -> bool;

    /// Records a debug message with named fields.
    fn debug(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]);
}

/// Sink backed by the `log` crate at debug level.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    target: &'static str,
}

impl LogSink {
    /// Creates a sink that logs under `target`.
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(module_path!())
    }
}

impl DebugSink for LogSink {
    fn enabled(&self) -> bool {
        log::log_enabled!(target: self.target, log::Level::Debug)
    }

    fn debug(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        log::debug!(target: self.target, "{}", Record { message, fields });
    }
}

impl<T: DebugSink + ?Sized> DebugSink for &T {
    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    fn debug(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        (**self).debug(message, fields);
    }
}

/// Formats as `message key=value key=value`.
struct Record<'a> {
    message: &'a str,
    fields: &'a [(&'a str, &'a dyn fmt::Display)],
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)?;
        for (key, value) in self.fields {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}
