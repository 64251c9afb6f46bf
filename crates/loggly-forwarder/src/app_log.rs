// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of application log records delivered by a log subscription.
//!
//! Every record becomes an event carrying its group, stream and timestamp.
//! The message text then runs through an ordered chain of [`Extractor`]s:
//!
//! ```text
//!   trimmed message
//!         │
//!         v
//!   ┌──────────────────┐
//!   │ foreman prefix   │  (unwraps "HH:MM:SS proc.N | rest", keeps going)
//!   └────────┬─────────┘
//!            v
//!   ┌──────────────────┐
//!   │ embedded JSON    │  (object keys replace the message)
//!   └────────┬─────────┘
//!            v
//!   ┌──────────────────┐
//!   │ tagged log line  │  ("I, [ts #pid] INFO -- : [tag] msg")
//!   └────────┬─────────┘
//!            v
//!   ┌──────────────────┐
//!   │ plain message    │  (always matches)
//!   └──────────────────┘
//! ```
//!
//! The first extractor that completes ends the chain. The order is part of
//! the contract: a message that is both valid JSON and a tagged line is
//! treated as JSON.

use crate::event::{EventBuilder, LogEvent, ParsedBatch};
use chrono::{DateTime, SecondsFormat};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{trace, warn};

lazy_static! {
    static ref FOREMAN_PREFIX_REGEX: Regex =
        Regex::new(r"(?s)^\d{2}:\d{2}:\d{2}\s+(\S+\.\d+)\s+\|\s*(.*)$")
            .expect("failed creating regex");
    static ref TAGGED_LINE_REGEX: Regex =
        Regex::new(r"(?s)^[A-Z]+, \[(\S+) #(\d+)\]\s+([A-Z]+) -- [^:]*:\s?(.*)$")
            .expect("failed creating regex");
    static ref LEADING_TAG_REGEX: Regex =
        Regex::new(r"^\[([^\]]*)\]\s*").expect("failed creating regex");
}

/// One entry of a subscription batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
}

/// Outcome of one step of the extraction chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Adds `fields` and hands `rest` to the next extractor.
    Unwrapped {
        fields: Map<String, Value>,
        rest: String,
    },
    /// Adds `fields` and ends the chain.
    Complete(Map<String, Value>),
    NoMatch,
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, message: &str) -> Extraction;
}

/// `18:02:23  web.1  |  text`, as written by foreman-style process managers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForemanPrefix;

impl Extractor for ForemanPrefix {
    fn name(&self) -> &'static str {
        "foreman_prefix"
    }

    fn attempt(&self, message: &str) -> Extraction {
        let Some(captures) = FOREMAN_PREFIX_REGEX.captures(message) else {
            return Extraction::NoMatch;
        };
        let mut fields = Map::new();
        fields.insert("foreman_process".to_string(), captures[1].into());
        Extraction::Unwrapped {
            fields,
            rest: captures[2].to_string(),
        }
    }
}

/// A message that is itself a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedJson;

impl Extractor for EmbeddedJson {
    fn name(&self) -> &'static str {
        "embedded_json"
    }

    fn attempt(&self, message: &str) -> Extraction {
        match serde_json::from_str::<Value>(message) {
            Ok(Value::Object(fields)) => Extraction::Complete(fields),
            _ => Extraction::NoMatch,
        }
    }
}

/// Ruby logger lines, optionally carrying bracketed tags before the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedLine;

impl Extractor for TaggedLine {
    fn name(&self) -> &'static str {
        "tagged_line"
    }

    fn attempt(&self, message: &str) -> Extraction {
        let Some(captures) = TAGGED_LINE_REGEX.captures(message) else {
            return Extraction::NoMatch;
        };

        let mut rest = captures.get(4).map_or("", |m| m.as_str());
        let mut tags = Vec::new();
        while let Some(tag) = LEADING_TAG_REGEX.captures(rest) {
            tags.push(Value::from(&tag[1]));
            rest = &rest[tag[0].len()..];
        }

        let mut fields = Map::new();
        fields.insert("log_level".to_string(), captures[3].into());
        fields.insert("pid".to_string(), captures[2].into());
        if !tags.is_empty() {
            fields.insert("log_tags".to_string(), Value::Array(tags));
        }
        fields.insert("message".to_string(), rest.into());
        Extraction::Complete(fields)
    }
}

/// Keeps the text as the event's message. Always matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMessage;

impl Extractor for PlainMessage {
    fn name(&self) -> &'static str {
        "plain_message"
    }

    fn attempt(&self, message: &str) -> Extraction {
        let mut fields = Map::new();
        fields.insert("message".to_string(), message.into());
        Extraction::Complete(fields)
    }
}

/// Turns subscription records into events.
pub struct ApplicationLogParser {
    chain: Vec<Box<dyn Extractor>>,
}

impl Default for ApplicationLogParser {
    fn default() -> Self {
        Self::with_chain(vec![
            Box::new(ForemanPrefix),
            Box::new(EmbeddedJson),
            Box::new(TaggedLine),
            Box::new(PlainMessage),
        ])
    }
}

impl ApplicationLogParser {
    /// Builds a parser running `chain` in order. If no extractor completes,
    /// the remaining text is kept as `message`.
    pub fn with_chain(chain: Vec<Box<dyn Extractor>>) -> Self {
        Self { chain }
    }

    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|extractor| extractor.name()).collect()
    }

    pub fn parse(&self, record: &LogRecord, group: &str, stream: &str) -> LogEvent {
        let mut event = EventBuilder::new();
        event.insert("logGroupName", group);
        event.insert("logStreamName", stream);
        event.insert("timestamp", format_timestamp(record.timestamp));

        let mut message = record.message.trim().to_string();
        let mut completed = false;
        for extractor in &self.chain {
            match extractor.attempt(&message) {
                Extraction::Unwrapped { fields, rest } => {
                    trace!("{} unwrapped message", extractor.name());
                    event.merge(fields);
                    message = rest;
                }
                Extraction::Complete(fields) => {
                    trace!("{} completed message", extractor.name());
                    event.merge(fields);
                    completed = true;
                    break;
                }
                Extraction::NoMatch => {}
            }
        }
        if !completed {
            event.insert("message", message);
        }

        event.build()
    }

    /// Parses a whole subscription batch, keeping record order.
    pub fn parse_batch(&self, records: &[LogRecord], group: &str, stream: &str) -> ParsedBatch {
        records
            .iter()
            .map(|record| self.parse(record, group, stream))
            .collect()
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2017-03-01T18:02:23.691Z`.
fn format_timestamp(epoch_millis: i64) -> String {
    match DateTime::from_timestamp_millis(epoch_millis) {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => {
            warn!("Log record timestamp {epoch_millis} is out of range, keeping it as is");
            epoch_millis.to_string()
        }
    }
}
