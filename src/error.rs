// SPDX-License-Identifier: Apache-2.0

//! Errors for the throttle crate.

/// Errors that can occur when configuring or driving the throttle gate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The event count threshold is invalid (zero).
    #[error("Invalid every: {every}. Every must be greater than zero.")]
    InvalidEvery {
        /// The invalid threshold.
        every: u64,
    },

    /// The time limit is invalid (negative or not finite).
    #[error("Invalid time limit: {limit}. Time limit must be finite and not negative.")]
    InvalidTimeLimit {
        /// The invalid limit in seconds.
        limit: f64,
    },

    /// The fixed sleep time is not a finite number.
    #[error("Invalid sleep time: {seconds}. Sleep time must be finite.")]
    InvalidSleepTime {
        /// The invalid sleep time in seconds.
        seconds: f64,
    },

    /// The sleep time is neither a number nor a field template.
    #[error("Invalid sleep time {value:?}: expected a number or a %{{field}} template")]
    InvalidSleepSetting {
        /// The configured value.
        value: String,
    },

    /// A field template duration can only be resolved against an event, so it
    /// cannot be paired with tick-driven time triggering.
    #[error("Sleep time template {template:?} requires an event, but periodic ticks may trigger a sleep")]
    TemplateRequiresEvent {
        /// The configured template.
        template: String,
    },

    /// The configuration document could not be parsed.
    #[error("Invalid throttle configuration: {error}")]
    InvalidConfig {
        /// The parser error.
        error: String,
    },

    /// The template references a field the event does not carry.
    #[error("Field {field:?} referenced by {template:?} is missing from the event")]
    MissingField {
        /// The missing field path.
        field: String,
        /// The template being resolved.
        template: String,
    },

    /// The rendered template is not a number of seconds.
    #[error("Template {template:?} resolved to {value:?}, which is not a number")]
    NotANumber {
        /// The rendered text.
        value: String,
        /// The template being resolved.
        template: String,
    },

    /// The sleep time is too long to wait for.
    #[error("Sleep time of {seconds} seconds is out of range")]
    SleepOutOfRange {
        /// The requested sleep in seconds.
        seconds: f64,
    },

    /// A template duration was resolved without a triggering event.
    #[error("Sleep time template {template:?} cannot be resolved without an event")]
    MissingEvent {
        /// The configured template.
        template: String,
    },

    /// The downstream sink refused the event.
    #[error("Failed to forward event: {error}")]
    SendFailed {
        /// The sink's error message.
        error: String,
    },
}
