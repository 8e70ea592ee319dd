// SPDX-License-Identifier: Apache-2.0

//! The throttle gate: a stateful stall point for an event pipeline.
//!
//! Every event passes through [`ThrottleGate::on_event`]; the host may also
//! drive [`ThrottleGate::on_periodic_tick`] on a fixed cadence. The gate
//! counts events and measures elapsed time, and when either reaches its
//! configured limit it blocks the calling thread for the sleep time.
//!
//! Two time policies are supported, selected by [`TriggerMode`]:
//!
//! - `EventClock` measures elapsed time from event timestamps and checks it
//!   against the wall clock on every event. When the timestamps run ahead of
//!   real time (bursts, replays) the accumulator is corrected to the real
//!   elapsed time; when they lag or stall the wall clock still triggers.
//! - `PeriodicTick` accumulates real time between ticks and sleeps once the
//!   accumulated time reaches the limit.
//!
//! The count trigger applies in both modes. State transitions happen under a
//! mutex; the sleep itself runs after the lock is released and only stalls
//! the thread that triggered it.

use crate::Error;
use crate::clock::{Clock, SystemClock};
use crate::event::Event;
use crate::observe::{DebugSink, LogSink};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Source of elapsed time for the time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Event timestamps, corrected against the wall clock.
    #[default]
    EventClock,
    /// Wall-clock time between periodic ticks.
    PeriodicTick,
}

/// How long to sleep when the gate triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum SleepDuration {
    /// A fixed number of seconds.
    Fixed(f64),
    /// Seconds read from the triggering event's fields.
    Template(Template),
}

impl SleepDuration {
    /// Parses a configured sleep time: a number of seconds or a field template.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSleepSetting` if `text` is neither.
    pub fn parse(text: &str) -> Result<Self, Error> {
        if let Ok(seconds) = text.trim().parse::<f64>() {
            return Ok(SleepDuration::Fixed(seconds));
        }
        Template::parse(text)
            .map(SleepDuration::Template)
            .ok_or_else(|| Error::InvalidSleepSetting {
                value: text.to_owned(),
            })
    }

    /// Resolves the duration for a trigger. Non-positive values mean no sleep.
    fn resolve(&self, event: Option<&dyn Event>) -> Result<Duration, Error> {
        match self {
            SleepDuration::Fixed(seconds) => seconds_to_duration(*seconds),
            SleepDuration::Template(template) => {
                let event = event.ok_or_else(|| Error::MissingEvent {
                    template: template.to_string(),
                })?;
                let value = template.render(event)?;
                let seconds = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite())
                    .ok_or_else(|| Error::NotANumber {
                        value: value.clone(),
                        template: template.to_string(),
                    })?;
                seconds_to_duration(seconds)
            }
        }
    }
}

fn seconds_to_duration(seconds: f64) -> Result<Duration, Error> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).map_err(|_| Error::SleepOutOfRange { seconds })
    } else {
        Ok(Duration::ZERO)
    }
}

/// Validated gate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSettings {
    sleep: SleepDuration,
    every: u64,
    time_limit: f64,
    mode: TriggerMode,
}

impl GateSettings {
    /// Creates gate settings.
    ///
    /// # Arguments
    ///
    /// * `sleep` - How long each trigger sleeps
    /// * `every` - Sleep on every N'th event
    /// * `time_limit` - Seconds of elapsed time before a forced sleep; 0 disables
    /// * `mode` - How elapsed time is measured
    ///
    /// # Errors
    ///
    /// Fails if `every` is zero, `time_limit` is negative or not finite, a fixed
    /// sleep is not finite or too long to represent, or a template sleep could
    /// be triggered by a tick.
    pub fn new(
        sleep: SleepDuration,
        every: u64,
        time_limit: f64,
        mode: TriggerMode,
    ) -> Result<Self, Error> {
        if every == 0 {
            return Err(Error::InvalidEvery { every });
        }
        if !time_limit.is_finite() || time_limit < 0.0 {
            return Err(Error::InvalidTimeLimit { limit: time_limit });
        }
        match &sleep {
            SleepDuration::Fixed(seconds)
                if !seconds.is_finite() || seconds_to_duration(*seconds).is_err() =>
            {
                return Err(Error::InvalidSleepTime { seconds: *seconds });
            }
            SleepDuration::Template(template)
                if mode == TriggerMode::PeriodicTick && time_limit > 0.0 =>
            {
                return Err(Error::TemplateRequiresEvent {
                    template: template.to_string(),
                });
            }
            _ => {}
        }
        Ok(Self {
            sleep,
            every,
            time_limit,
            mode,
        })
    }

    /// The sleep duration.
    pub fn sleep(&self) -> &SleepDuration {
        &self.sleep
    }

    /// The event count threshold.
    pub fn every(&self) -> u64 {
        self.every
    }

    /// The time limit in seconds.
    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    /// The time trigger mode.
    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    fn time_triggering(&self, mode: TriggerMode) -> bool {
        self.mode == mode && self.time_limit > 0.0
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            sleep: SleepDuration::Fixed(1.0),
            every: 1,
            time_limit: 0.0,
            mode: TriggerMode::EventClock,
        }
    }
}

/// What caused a sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The event count reached `every`.
    Count,
    /// Elapsed time reached the time limit.
    Elapsed,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Count => "count",
            Trigger::Elapsed => "elapsed",
        })
    }
}

/// A point-in-time copy of the gate's counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSnapshot {
    /// Events observed since the last sleep.
    pub event_count: u64,
    /// Elapsed-time accumulator in seconds. Counts down as event time advances
    /// in event-clock mode, up with wall-clock time in tick mode.
    pub elapsed: f64,
    /// Timestamp of the previous event, if any since the last sleep.
    pub last_event_clock: Option<f64>,
    /// Sleeps performed since the gate was created.
    pub sleeps: u64,
    /// Total time slept since the gate was created.
    pub total_slept: Duration,
}

#[derive(Debug)]
struct State {
    event_count: u64,
    elapsed: f64,
    last_event_clock: Option<f64>,
    /// Wall-clock instant at which the latest sleep ends (or gate creation).
    last_sleep: Instant,
    last_tick: Instant,
    sleeps: u64,
    total_slept: Duration,
}

/// A sleep decided under the lock, performed after it is released.
struct PlannedSleep {
    trigger: Trigger,
    duration: Result<Duration, Error>,
}

/// Count and elapsed-time throttling gate.
///
/// A single gate is shared by every worker of a pipeline stage; the count and
/// time limits apply to the aggregate of all callers.
pub struct ThrottleGate<C: Clock = SystemClock, S: DebugSink = LogSink> {
    settings: GateSettings,
    clock: C,
    sink: S,
    state: Mutex<State>,
}

impl ThrottleGate {
    /// Creates a gate on the system clock that logs through `log`.
    pub fn from_settings(settings: GateSettings) -> Self {
        Self::new(settings, SystemClock, LogSink::default())
    }
}

impl<C: Clock, S: DebugSink> ThrottleGate<C, S> {
    /// Creates a gate; the time baseline starts now.
    pub fn new(settings: GateSettings, clock: C, sink: S) -> Self {
        let now = clock.now();
        Self {
            settings,
            clock,
            sink,
            state: Mutex::new(State {
                event_count: 0,
                elapsed: 0.0,
                last_event_clock: None,
                last_sleep: now,
                last_tick: now,
                sleeps: 0,
                total_slept: Duration::ZERO,
            }),
        }
    }

    /// The gate's settings.
    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Returns a copy of the current counters.
    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.lock();
        GateSnapshot {
            event_count: state.event_count,
            elapsed: state.elapsed,
            last_event_clock: state.last_event_clock,
            sleeps: state.sleeps,
            total_slept: state.total_slept,
        }
    }

    /// Accounts for one event and sleeps if a limit is reached.
    ///
    /// Returns how long the calling thread slept (zero if the gate did not
    /// trigger). At most one sleep happens per event.
    ///
    /// # Errors
    ///
    /// Returns the template resolution error if the sleep time could not be
    /// read from the event. The trigger is still consumed and no sleep happens.
    pub fn on_event<E: Event>(&self, event: &E) -> Result<Duration, Error> {
        let planned = {
            let mut state = self.lock();
            state.event_count += 1;
            let timestamp = event.timestamp();
            let event: &dyn Event = event;
            let mut planned = None;

            if self.settings.time_triggering(TriggerMode::EventClock) {
                if let Some(last) = state.last_event_clock {
                    let delta = timestamp - last;
                    if delta.is_finite() {
                        state.elapsed -= delta;
                    }
                }
                let now = self.clock.now();
                if self.elapsed_limit_reached(&mut state, now) {
                    planned =
                        Some(self.plan_sleep(&mut state, Some(event), now, Trigger::Elapsed));
                }
            }
            if planned.is_none() && state.event_count >= self.settings.every {
                let now = self.clock.now();
                planned = Some(self.plan_sleep(&mut state, Some(event), now, Trigger::Count));
            }

            state.last_event_clock = timestamp.is_finite().then_some(timestamp);
            planned
        };

        match planned {
            Some(planned) => self.start_sleep(planned),
            None => Ok(Duration::ZERO),
        }
    }

    /// Adds the wall-clock time since the previous tick and sleeps once the
    /// accumulated time reaches the limit.
    ///
    /// Does nothing unless the gate is in tick mode with a time limit.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingEvent` if the sleep time is a template, which
    /// `GateSettings::new` rejects for tick mode.
    pub fn on_periodic_tick(&self) -> Result<Duration, Error> {
        if !self.settings.time_triggering(TriggerMode::PeriodicTick) {
            return Ok(Duration::ZERO);
        }

        let planned = {
            let mut state = self.lock();
            let now = self.clock.now();
            state.elapsed += now.saturating_duration_since(state.last_tick).as_secs_f64();
            state.last_tick = state.last_tick.max(now);

            (state.elapsed >= self.settings.time_limit)
                .then(|| self.plan_sleep(&mut state, None, now, Trigger::Elapsed))
        };

        match planned {
            Some(planned) => self.start_sleep(planned),
            None => Ok(Duration::ZERO),
        }
    }

    /// Checks the time limit against the wall clock.
    ///
    /// The event-derived accumulator is an estimate of elapsed time. When it
    /// has reached the limit but the wall clock has not, it is corrected down
    /// to the real elapsed time. The wall clock decides the trigger.
    fn elapsed_limit_reached(&self, state: &mut State, now: Instant) -> bool {
        let limit = self.settings.time_limit;
        let wall = now.saturating_duration_since(state.last_sleep).as_secs_f64();
        let wall_reached = wall >= limit;

        if state.elapsed <= -limit && !wall_reached {
            state.elapsed = -wall;
        }
        wall_reached
    }

    /// Resolves the sleep time and resets the counters as one transition.
    fn plan_sleep(
        &self,
        state: &mut State,
        event: Option<&dyn Event>,
        now: Instant,
        trigger: Trigger,
    ) -> PlannedSleep {
        let duration = self.settings.sleep.resolve(event).and_then(|slept| {
            now.checked_add(slept)
                .map(|wake| (slept, wake))
                .ok_or(Error::SleepOutOfRange {
                    seconds: slept.as_secs_f64(),
                })
        });
        let (slept, wake) = duration.as_ref().copied().unwrap_or((Duration::ZERO, now));

        state.event_count = 0;
        state.elapsed = 0.0;
        state.last_event_clock = None;
        state.last_sleep = wake;
        state.last_tick = wake;
        if duration.is_ok() {
            state.sleeps += 1;
            state.total_slept = state.total_slept.saturating_add(slept);
        }

        PlannedSleep {
            trigger,
            duration: duration.map(|(slept, _)| slept),
        }
    }

    /// Reports and performs a planned sleep on the calling thread.
    fn start_sleep(&self, planned: PlannedSleep) -> Result<Duration, Error> {
        let slept = planned.duration?;
        if self.sink.enabled() {
            let delay = slept.as_secs_f64();
            self.sink
                .debug("Sleeping", &[("delay", &delay), ("trigger", &planned.trigger)]);
        }
        if !slept.is_zero() {
            self.clock.sleep(slept);
        }
        Ok(slept)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Transitions never panic midway, so a poisoned state is still whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
