// SPDX-License-Identifier: Apache-2.0

//! Events as seen by the throttle gate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An event flowing through the gate.
///
/// The gate only reads the timestamp (for elapsed-time triggering) and, when
/// the sleep time is a field template, the referenced fields.
pub trait Event {
    /// Event time in seconds, fractional.
    fn timestamp(&self) -> f64;

    /// Returns the rendered value of the field at `path`, or `None` if the
    /// event does not carry it. A single-element path names a top-level field.
    fn field(&self, path: &[String]) -> Option<String>;
}

/// A structured log record with a timestamp and JSON fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogEvent {
    /// Seconds since the epoch.
    pub timestamp: f64,

    /// Named fields; nested objects are addressed with `[outer][inner]`.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl LogEvent {
    /// Creates an event with no fields.
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            fields: Map::new(),
        }
    }

    /// Adds a top-level field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.fields.insert(name.into(), value.into());
        self
    }
}

impl Event for LogEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn field(&self, path: &[String]) -> Option<String> {
        let (first, rest) = path.split_first()?;
        let mut value = self.fields.get(first)?;
        for key in rest {
            value = value.as_object()?.get(key)?;
        }
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl<E: Event + ?Sized> Event for &E {
    fn timestamp(&self) -> f64 {
        (**self).timestamp()
    }

    fn field(&self, path: &[String]) -> Option<String> {
        (**self).field(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_top_level_fields() {
        let event = LogEvent::new(12.5)
            .with_field("delay", "0.25")
            .with_field("count", 3)
            .with_field("nothing", Value::Null);

        assert_eq!(event.timestamp(), 12.5);
        assert_eq!(event.field(&path(&["delay"])).as_deref(), Some("0.25"));
        assert_eq!(event.field(&path(&["count"])).as_deref(), Some("3"));
        assert_eq!(event.field(&path(&["nothing"])), None);
        assert_eq!(event.field(&path(&["absent"])), None);
        assert_eq!(event.field(&[]), None);
    }

    #[test]
    fn test_nested_fields() {
        let event = LogEvent::new(0.0).with_field("throttle", json!({"delay": {"secs": 1.5}}));

        assert_eq!(
            event.field(&path(&["throttle", "delay", "secs"])).as_deref(),
            Some("1.5")
        );
        assert_eq!(event.field(&path(&["throttle", "missing"])), None);
        assert_eq!(event.field(&path(&["throttle", "delay", "secs", "deeper"])), None);
    }

    #[test]
    fn test_event_from_json() {
        let event: LogEvent =
            serde_json::from_str(r#"{"timestamp": 3.0, "fields": {"host": "a"}}"#).unwrap();
        assert_eq!(event.timestamp, 3.0);
        assert_eq!(event.field(&path(&["host"])).as_deref(), Some("a"));
    }
}
