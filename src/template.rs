// SPDX-License-Identifier: Apache-2.0

//! Field reference templates such as `%{delay}` or `%{[throttle][delay]}`.
//!
//! A template is parsed once when the gate is configured and rendered against
//! each triggering event.

use crate::Error;
use crate::event::Event;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Vec<String>),
}

/// A parsed string with one or more field references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, returning `None` if it references no field.
    ///
    /// An unterminated `%{` or a malformed reference is kept as literal text.
    pub fn parse(source: &str) -> Option<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("%{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            push_literal(&mut segments, &rest[..start]);
            match parse_path(&after[..end]) {
                Some(path) => segments.push(Segment::Field(path)),
                None => push_literal(&mut segments, &rest[start..start + 3 + end]),
            }
            rest = &after[end + 1..];
        }
        push_literal(&mut segments, rest);

        segments
            .iter()
            .any(|s| matches!(s, Segment::Field(_)))
            .then(|| Self {
                source: source.to_owned(),
                segments,
            })
    }

    /// The template text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the template with the event's field values.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingField` if the event lacks a referenced field.
    pub fn render<E: Event + ?Sized>(&self, event: &E) -> Result<String, Error> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(path) => {
                    let value = event.field(path).ok_or_else(|| Error::MissingField {
                        field: display_path(path),
                        template: self.source.clone(),
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Resolves `template` against `event`.
pub fn resolve<E: Event + ?Sized>(template: &Template, event: &E) -> Result<String, Error> {
    template.render(event)
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_owned()));
    }
}

/// `name` is a top-level field; `[a][b]` walks nested objects.
fn parse_path(reference: &str) -> Option<Vec<String>> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if !reference.contains(['[', ']']) {
        return Some(vec![reference.to_owned()]);
    }
    let inner = reference.strip_prefix('[')?.strip_suffix(']')?;
    let parts: Vec<String> = inner.split("][").map(str::to_owned).collect();
    parts
        .iter()
        .all(|p| !p.is_empty() && !p.contains(['[', ']']))
        .then_some(parts)
}

fn display_path(path: &[String]) -> String {
    match path {
        [single] => single.clone(),
        _ => path.iter().map(|p| format!("[{p}]")).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogEvent;
    use serde_json::json;

    #[test]
    fn test_plain_text_is_not_a_template() {
        assert!(Template::parse("1.5").is_none());
        assert!(Template::parse("").is_none());
        assert!(Template::parse("%{unterminated").is_none());
        assert!(Template::parse("%{}").is_none());
        assert!(Template::parse("%{[bad}").is_none());
    }

    #[test]
    fn test_render_top_level_field() {
        let template = Template::parse("%{delay}").unwrap();
        let event = LogEvent::new(0.0).with_field("delay", "0.5");

        assert_eq!(template.as_str(), "%{delay}");
        assert_eq!(resolve(&template, &event).unwrap(), "0.5");
    }

    #[test]
    fn test_render_nested_field_with_literals() {
        let template = Template::parse("%{[a][b]}%{[a][c]} %{").unwrap();
        let event = LogEvent::new(0.0).with_field("a", json!({"b": 1, "c": "5"}));

        assert_eq!(template.render(&event).unwrap(), "15 %{");
    }

    #[test]
    fn test_malformed_reference_kept_literally() {
        let template = Template::parse("%{[x}%{y}").unwrap();
        let event = LogEvent::new(0.0).with_field("y", "2");

        assert_eq!(template.render(&event).unwrap(), "%{[x}2");
    }

    #[test]
    fn test_missing_field() {
        let template = Template::parse("%{[outer][inner]}").unwrap();
        let event = LogEvent::new(0.0);

        match template.render(&event) {
            Err(Error::MissingField { field, template }) => {
                assert_eq!(field, "[outer][inner]");
                assert_eq!(template, "%{[outer][inner]}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
