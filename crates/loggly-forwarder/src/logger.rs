// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log output of the forwarder itself.
//!
//! Lines carry a fixed prefix so they stand out from the application logs
//! that share the same log group:
//!
//! ```text
//! CW2LOGGLY | INFO | DELIVERY | Sending 3 events to loggly
//! CW2LOGGLY | WARN | object{key="elb.log"}: PIPELINE | Bucket has no loggly-tag tag
//! ```

use crate::error::ConfigError;
use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, DefaultFields, FormatEvent, FormatFields},
    FmtContext, FormattedFields, SubscriberBuilder,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

pub const LOG_PREFIX: &str = "CW2LOGGLY";

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "{LOG_PREFIX} | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter directive for `level`, silencing the HTTP stack below it.
pub fn env_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{level}")).map_err(|e| {
        ConfigError::Invalid {
            name: "LOG_LEVEL",
            message: e.to_string(),
        }
    })
}

/// Plain-text subscriber with the forwarder's line format. Colors stay off
/// whatever features the build enables: the output lands in CloudWatch.
pub fn subscriber_builder(
    level: &str,
) -> Result<SubscriberBuilder<DefaultFields, Formatter, EnvFilter>, ConfigError> {
    Ok(tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(level)?)
        .with_ansi(false)
        .event_format(Formatter))
}

/// Installs the global subscriber. Fails if `level` is not a valid filter or
/// a subscriber is already installed.
pub fn init(level: &str) -> Result<(), ConfigError> {
    let subscriber = subscriber_builder(level)?.finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| ConfigError::Invalid {
        name: "LOG_LEVEL",
        message: e.to_string(),
    })
}
