// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for every stage of the forwarding pipeline.
//!
//! Each concern has its own enum so callers can match on exactly the failure
//! they care about; [`ForwarderError`] is the umbrella returned by the
//! top-level pipeline operations.

use std::error::Error as StdError;

/// The streamed payload could not be turned into a batch.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid gzip: {0}")]
    Gzip(#[source] std::io::Error),

    /// Carries the decompressed text so the offending input can be logged.
    #[error("payload is not valid JSON: {source}. Input: {raw}")]
    Json {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An access log line that matches none of the known layouts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed access log line ({reason}): {line}")]
pub struct MalformedLineError {
    pub line: String,
    pub reason: String,
}

impl MalformedLineError {
    pub fn new(line: &str, reason: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The collector closed the response with a non-2xx status and never acknowledged.
    #[error("collector responded with {status_code} {status_text}")]
    Status { status_code: u16, status_text: String },

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// Only produced when a bounded attempt limit is configured.
    #[error("no outcome after {attempts} attempts")]
    DeadlineExhausted { attempts: u32 },

    #[error("invalid collector url: {0}")]
    InvalidUrl(String),

    #[error("failed to serialize events: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DeliveryError {
    pub fn transport<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err)
    }
}

/// Decryption failures are cached and handed to every caller, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decrypt customer token: {0}")]
pub struct DecryptError(pub String);

/// Failure reported by an [`ObjectSource`](crate::forwarder::ObjectSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to fetch s3://{bucket}/{key}: {message}")]
    Fetch {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to read tags of bucket {bucket}: {message}")]
    Tags { bucket: String, message: String },

    #[error("failed to decompress s3://{bucket}/{key}: {source}")]
    Gzip {
        bucket: String,
        key: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    MalformedLine(#[from] MalformedLineError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
