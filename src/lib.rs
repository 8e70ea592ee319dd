// SPDX-License-Identifier: Apache-2.0

//! Throttling gate for the OTAP dataflow engine.
//!
//! This crate provides a gate that stalls a pipeline stage by sleeping every
//! N events, or once a time limit elapses, applying backpressure to upstream
//! producers.

mod clock;
mod config;
mod error;
mod event;
mod gate;
mod observe;
mod processor;
mod template;

pub use clock::{Clock, SystemClock};
pub use config::{SleepTime, ThrottleConfig};
pub use error::Error;
pub use event::{Event, LogEvent};
pub use gate::{GateSettings, GateSnapshot, SleepDuration, ThrottleGate, Trigger, TriggerMode};
pub use observe::{DebugSink, LogSink};
pub use processor::{
    ControlMsg, DEFAULT_FLUSH_INTERVAL, EffectHandler, Message, ThrottleProcessor,
};
pub use template::{Template, resolve};
