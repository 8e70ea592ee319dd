// SPDX-License-Identifier: Apache-2.0

//! Throttle processor for an event pipeline.
//!
//! The processor passes every event through a shared [`ThrottleGate`] and
//! then forwards it unmodified. When the gate triggers, the calling worker
//! stalls before forwarding, which holds back the pipeline stage.

use crate::Error;
use crate::clock::{Clock, SystemClock};
use crate::config::ThrottleConfig;
use crate::event::Event;
use crate::gate::{ThrottleGate, TriggerMode};
use crate::observe::{DebugSink, LogSink};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Cadence at which hosts should deliver timer ticks when
/// [`ThrottleProcessor::periodic_flush`] is true.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Control messages delivered to the processor by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMsg {
    /// Periodic flush heartbeat.
    TimerTick,
    /// The pipeline is stopping.
    Shutdown {
        /// Why the pipeline is stopping.
        reason: String,
    },
}

/// A message received by the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<E> {
    /// Pipeline data.
    PData(E),
    /// Host control.
    Control(ControlMsg),
}

/// Forwards events to the next pipeline stage.
pub trait EffectHandler<E> {
    /// Sends `data` downstream.
    fn send_message(&mut self, data: E) -> Result<(), Error>;
}

impl<E> EffectHandler<E> for Vec<E> {
    fn send_message(&mut self, data: E) -> Result<(), Error> {
        self.push(data);
        Ok(())
    }
}

/// A processor that delays events by sleeping every N events or after a time limit.
///
/// Clones share the same gate, so every worker of a stage counts against the
/// same limits.
pub struct ThrottleProcessor<C: Clock = SystemClock, S: DebugSink = LogSink> {
    /// The shared gate.
    pub gate: Arc<ThrottleGate<C, S>>,
}

impl<C: Clock, S: DebugSink> Clone for ThrottleProcessor<C, S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl ThrottleProcessor {
    /// Creates a throttle processor with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ThrottleConfig) -> Result<Self, Error> {
        let settings = config.settings()?;
        Ok(Self::with_gate(ThrottleGate::from_settings(settings)))
    }

    /// Creates a throttle processor from a JSON node configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the JSON does not match
    /// [`ThrottleConfig`], or the validation error for invalid settings.
    pub fn from_config(config: &serde_json::Value) -> Result<Self, Error> {
        Self::new(ThrottleConfig::from_json(config)?)
    }
}

impl<C: Clock, S: DebugSink> ThrottleProcessor<C, S> {
    /// Wraps an existing gate.
    pub fn with_gate(gate: ThrottleGate<C, S>) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }

    /// Whether the host must deliver [`ControlMsg::TimerTick`] for the time
    /// limit to take effect.
    pub fn periodic_flush(&self) -> bool {
        let settings = self.gate.settings();
        settings.mode() == TriggerMode::PeriodicTick && settings.time_limit() > 0.0
    }

    /// Handles one message, forwarding pdata once the gate lets it through.
    ///
    /// # Errors
    ///
    /// Only downstream send failures are returned. A sleep time that cannot
    /// be read from an event is logged and the event passes without a sleep.
    pub fn process<E, H>(&self, msg: Message<E>, effect_handler: &mut H) -> Result<(), Error>
    where
        E: Event,
        H: EffectHandler<E>,
    {
        match msg {
            Message::PData(data) => {
                if let Err(e) = self.gate.on_event(&data) {
                    warn!("Throttle sleep skipped: {e}");
                }
                effect_handler.send_message(data)
            }
            Message::Control(ControlMsg::TimerTick) => {
                if let Err(e) = self.gate.on_periodic_tick() {
                    warn!("Throttle sleep skipped on flush: {e}");
                }
                Ok(())
            }
            Message::Control(ControlMsg::Shutdown { reason }) => {
                let snapshot = self.gate.snapshot();
                debug!(
                    "Throttle shutting down ({reason}): {} sleeps, {:?} slept",
                    snapshot.sleeps, snapshot.total_slept
                );
                Ok(())
            }
        }
    }
}
