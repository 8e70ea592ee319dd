// SPDX-License-Identifier: Apache-2.0

//! Configuration for the throttle processor.

use crate::Error;
use crate::gate::{GateSettings, SleepDuration, TriggerMode};
use serde::{Deserialize, Serialize};

/// Default sleep time in seconds.
const DEFAULT_SLEEPTIME: f64 = 1.0;

/// Default event count threshold: sleep on every event.
const DEFAULT_EVERY: u64 = 1;

/// A sleep time as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SleepTime {
    /// Seconds, e.g. `0.5`.
    Seconds(f64),
    /// A numeric string (`"1"`) or a field template (`"%{delay}"`).
    Text(String),
}

/// Configuration for the throttle processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// How long to sleep on each trigger.
    #[serde(default = "default_sleeptime", alias = "time")]
    pub sleeptime: SleepTime,

    /// Sleep on every N'th event.
    #[serde(default = "default_every")]
    pub every: u64,

    /// Forces a sleep once this many seconds have elapsed without one.
    /// Zero disables the time limit.
    #[serde(default)]
    pub timelimit: f64,

    /// How elapsed time is measured.
    #[serde(default)]
    pub mode: TriggerMode,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            sleeptime: default_sleeptime(),
            every: DEFAULT_EVERY,
            timelimit: 0.0,
            mode: TriggerMode::default(),
        }
    }
}

impl ThrottleConfig {
    /// Parses a configuration from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for unknown fields or mistyped values.
    pub fn from_json(config: &serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(config.clone()).map_err(|e| Error::InvalidConfig {
            error: e.to_string(),
        })
    }

    /// Validates the configuration into gate settings.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn settings(&self) -> Result<GateSettings, Error> {
        let sleep = match &self.sleeptime {
            SleepTime::Seconds(seconds) => SleepDuration::Fixed(*seconds),
            SleepTime::Text(text) => SleepDuration::parse(text)?,
        };
        GateSettings::new(sleep, self.every, self.timelimit, self.mode)
    }
}

fn default_sleeptime() -> SleepTime {
    SleepTime::Seconds(DEFAULT_SLEEPTIME)
}

fn default_every() -> u64 {
    DEFAULT_EVERY
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = ThrottleConfig::default();
        assert_eq!(config.sleeptime, SleepTime::Seconds(1.0));
        assert_eq!(config.every, 1);
        assert_eq!(config.timelimit, 0.0);
        assert_eq!(config.mode, TriggerMode::EventClock);
        assert_eq!(config.settings().unwrap(), GateSettings::default());
    }

    #[test]
    fn test_config_defaults_in_json() {
        let config = ThrottleConfig::from_json(&json!({})).unwrap();
        assert_eq!(config, ThrottleConfig::default());
    }

    #[test]
    fn test_config_from_json() {
        let config = ThrottleConfig::from_json(&json!({
            "sleeptime": "0.5",
            "every": 10,
            "timelimit": 30,
            "mode": "periodic_tick"
        }))
        .unwrap();

        let settings = config.settings().unwrap();
        assert_eq!(settings.sleep(), &SleepDuration::Fixed(0.5));
        assert_eq!(settings.every(), 10);
        assert_eq!(settings.time_limit(), 30.0);
        assert_eq!(settings.mode(), TriggerMode::PeriodicTick);
    }

    #[test]
    fn test_time_alias_with_template() {
        let config = ThrottleConfig::from_json(&json!({"time": "%{delay}", "every": 2})).unwrap();
        assert_eq!(config.sleeptime, SleepTime::Text("%{delay}".into()));
        assert!(matches!(
            config.settings().unwrap().sleep(),
            SleepDuration::Template(_)
        ));
    }

    #[test]
    fn test_rejected_configs() {
        let unknown = ThrottleConfig::from_json(&json!({"timelimt": 10}));
        assert!(matches!(unknown, Err(Error::InvalidConfig { .. })));

        let negative_every = ThrottleConfig::from_json(&json!({"every": -1}));
        assert!(matches!(negative_every, Err(Error::InvalidConfig { .. })));

        let zero_every = ThrottleConfig::from_json(&json!({"every": 0})).unwrap();
        assert!(matches!(zero_every.settings(), Err(Error::InvalidEvery { .. })));

        let bad_sleep = ThrottleConfig::from_json(&json!({"sleeptime": "soon"})).unwrap();
        assert!(matches!(
            bad_sleep.settings(),
            Err(Error::InvalidSleepSetting { .. })
        ));

        let tick_template = ThrottleConfig::from_json(&json!({
            "sleeptime": "%{delay}",
            "timelimit": 5,
            "mode": "periodic_tick"
        }))
        .unwrap();
        assert!(matches!(
            tick_template.settings(),
            Err(Error::TemplateRequiresEvent { .. })
        ));
    }
}
