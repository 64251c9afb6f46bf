// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured events and the batches and targets they travel with.

use serde::Serialize;
use serde_json::{Map, Value};

/// One normalized log entry.
///
/// Field order is the order in which the parser inserted the fields, which is
/// also the order they are serialized in. Events are read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogEvent(Map<String, Value>);

impl LogEvent {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

impl From<LogEvent> for Value {
    fn from(event: LogEvent) -> Self {
        Value::Object(event.0)
    }
}

/// Accumulates the fields of a [`LogEvent`] while a parser runs.
#[derive(Debug, Default)]
pub(crate) struct EventBuilder {
    fields: Map<String, Value>,
}

impl EventBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Later values win on key collisions.
    pub(crate) fn merge(&mut self, other: Map<String, Value>) {
        for (field, value) in other {
            self.fields.insert(field, value);
        }
    }

    pub(crate) fn build(self) -> LogEvent {
        LogEvent(self.fields)
    }
}

/// Ordered events drawn from one source unit: a streamed batch or a stored object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    events: Vec<LogEvent>,
}

impl ParsedBatch {
    pub fn new(events: Vec<LogEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bulk endpoint body: one JSON document per line, in parsing order.
    pub fn to_bulk_body(&self) -> Result<String, serde_json::Error> {
        let lines = self
            .events
            .iter()
            .map(LogEvent::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }
}

impl FromIterator<LogEvent> for ParsedBatch {
    fn from_iter<I: IntoIterator<Item = LogEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Where, and under which account, a batch is delivered.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub token: String,
    pub tag: String,
    pub host: String,
}

impl DeliveryTarget {
    pub fn new(token: impl Into<String>, tag: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            tag: tag.into(),
            host: host.into(),
        }
    }
}

// The token is a credential; keep it out of logs.
impl std::fmt::Debug for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryTarget")
            .field("token", &"<redacted>")
            .field("tag", &self.tag)
            .field("host", &self.host)
            .finish()
    }
}
