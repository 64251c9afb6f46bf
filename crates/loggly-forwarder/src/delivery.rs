// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bulk delivery of a batch to the Loggly bulk endpoint.
//!
//! # Protocol
//!
//! ```text
//!   batch ──> newline-joined JSON body
//!                  │
//!                  v
//!          ┌───────────────┐   deadline elapsed
//!          │ POST /bulk/…  │ <──────────────────┐
//!          └───────┬───────┘                    │
//!                  v                            │
//!          ┌───────────────┐  no outcome yet    │
//!          │ read fragments│ ───────────────────┘
//!          └───────┬───────┘
//!                  v
//!   {"response":"ok"} fragment ──> success (without waiting for the end)
//!   end of body, 2xx          ──> success
//!   end of body, other status ──> DeliveryError::Status
//!   transport failure         ──> DeliveryError::Transport (not retried)
//! ```
//!
//! Loggly has been seen acknowledging a bulk request in the body and then
//! holding the response open, which is why an acknowledgment fragment ends
//! the exchange on its own.

use crate::error::DeliveryError;
use crate::event::{DeliveryTarget, ParsedBatch};
use crate::transport::{BulkResponse, HttpTransport, Transport};
use bytes::Bytes;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Time one exchange may take before it is abandoned and restarted.
pub const DEFAULT_DELIVERY_DEADLINE: Duration = Duration::from_millis(9_900);

/// When to give up on an exchange and how often to start over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub deadline: Duration,
    /// `None` restarts without limit.
    pub max_attempts: Option<u32>,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DELIVERY_DEADLINE,
            max_attempts: None,
        }
    }
}

/// Client for the bulk endpoint.
#[derive(Debug, Clone)]
pub struct BulkClient<T = HttpTransport> {
    transport: T,
    policy: DeliveryPolicy,
}

impl<T: Transport> BulkClient<T> {
    pub fn new(transport: T, policy: DeliveryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Delivers `batch` to `target`, restarting the whole exchange every time
    /// the deadline elapses without an outcome.
    pub async fn deliver(
        &self,
        target: &DeliveryTarget,
        batch: &ParsedBatch,
    ) -> Result<(), DeliveryError> {
        let url = bulk_url(target)?;
        let body = Bytes::from(batch.to_bulk_body()?);
        info!("DELIVERY | Sending {} events to loggly", batch.len());

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match timeout(self.policy.deadline, self.exchange(&url, body.clone())).await {
                Ok(outcome) => return outcome,
                Err(_) => {
                    warn!(
                        "DELIVERY | No response from loggly after {} ms (attempt {})",
                        self.policy.deadline.as_millis(),
                        attempts
                    );
                    if self
                        .policy
                        .max_attempts
                        .is_some_and(|max_attempts| attempts >= max_attempts)
                    {
                        return Err(DeliveryError::DeadlineExhausted { attempts });
                    }
                }
            }
        }
    }

    async fn exchange(&self, url: &Url, body: Bytes) -> Result<(), DeliveryError> {
        let response = self.transport.post(url, body).await?;
        let status_text = response.status_text();
        let BulkResponse {
            status,
            mut fragments,
        } = response;
        info!("DELIVERY | Loggly response status code: {}", status.as_u16());

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if is_acknowledgment(&fragment) {
                debug!("DELIVERY | Loggly acknowledged the batch");
                return Ok(());
            }
            info!(
                "DELIVERY | Loggly responded: {}",
                String::from_utf8_lossy(&fragment)
            );
        }

        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status_code: status.as_u16(),
                status_text: status_text.to_string(),
            })
        }
    }
}

/// Characters left as is in a path segment: the unreserved set of
/// JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// `<scheme>://<host>/bulk/<token>/tag/<tag>`, with `https` unless the host
/// names its own scheme. Token and tag are percent-encoded as URI components.
pub fn bulk_url(target: &DeliveryTarget) -> Result<Url, DeliveryError> {
    let base = if target.host.contains("://") {
        target.host.clone()
    } else {
        format!("https://{}", target.host)
    };
    let mut url = Url::parse(&base)
        .map_err(|e| DeliveryError::InvalidUrl(format!("{}: {e}", target.host)))?;
    if url.cannot_be_a_base() {
        return Err(DeliveryError::InvalidUrl(target.host.clone()));
    }
    url.set_path(&format!(
        "/bulk/{}/tag/{}",
        path_segment("token", &target.token)?,
        path_segment("tag", &target.tag)?
    ));
    Ok(url)
}

// URL parsers resolve `.` and `..` segments (escaped or not), which would
// post to a different path.
fn path_segment(name: &str, value: &str) -> Result<String, DeliveryError> {
    if matches!(value, "." | "..") {
        return Err(DeliveryError::InvalidUrl(format!(
            "{name} {value:?} is not usable as a path segment"
        )));
    }
    Ok(utf8_percent_encode(value, URI_COMPONENT).to_string())
}

/// True for a fragment that is exactly a JSON object with `"response": "ok"`.
fn is_acknowledgment(fragment: &[u8]) -> bool {
    serde_json::from_slice::<Value>(fragment)
        .ok()
        .and_then(|value| value.get("response").and_then(Value::as_str).map(|r| r == "ok"))
        .unwrap_or(false)
}
