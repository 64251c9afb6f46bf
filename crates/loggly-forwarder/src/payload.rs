// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoding of the raw deliveries: subscription payloads and stored objects.

use crate::app_log::LogRecord;
use crate::error::{DecodeError, SourceError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use tracing::error;

/// A subscription delivery after base64 decoding and decompression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamedBatch {
    #[serde(default)]
    pub log_events: Vec<LogRecord>,
    #[serde(default)]
    pub log_group: String,
    #[serde(default)]
    pub log_stream: String,
}

impl StreamedBatch {
    /// Decodes the `awslogs.data` field of a subscription event:
    /// base64, then gzip, then JSON.
    pub fn decode(data: &str) -> Result<Self, DecodeError> {
        let compressed = STANDARD.decode(data.trim())?;
        let raw = gunzip(&compressed).map_err(DecodeError::Gzip)?;
        Self::from_json(&String::from_utf8_lossy(&raw))
    }

    /// Parses an already decompressed payload.
    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(raw).map_err(|source| {
            error!("Error while parsing json. Input: {raw}");
            DecodeError::Json {
                raw: raw.to_string(),
                source,
            }
        })
    }
}

/// Location of a stored access log object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn is_gzipped(&self) -> bool {
        self.key.ends_with(".gz")
    }
}

/// Text of a stored object, decompressing it when its key ends in `.gz`.
pub fn decode_object_body(object: &ObjectRef, body: &[u8]) -> Result<String, SourceError> {
    if !object.is_gzipped() {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }
    let raw = gunzip(body).map_err(|source| SourceError::Gzip {
        bucket: object.bucket.clone(),
        key: object.key.clone(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
