// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The HTTP exchange with the collector, behind a trait so delivery logic can
//! be driven by scripted transports in tests.

use crate::config::Config;
use crate::error::DeliveryError;
use async_trait::async_trait;
use bytes::Bytes;
use core::time::Duration;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use std::error::Error;
use std::sync::Arc;
use tracing::error;

/// Response body fragments in arrival order. Ends when the collector closes
/// the response.
pub type FragmentStream = BoxStream<'static, Result<Bytes, DeliveryError>>;

/// Status line and streaming body of a bulk request.
pub struct BulkResponse {
    pub status: StatusCode,
    pub fragments: FragmentStream,
}

impl BulkResponse {
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or_default()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` as a JSON POST to `url`. Resolves once the response
    /// headers arrive; the body is read through the returned stream.
    async fn post(&self, url: &Url, body: Bytes) -> Result<BulkResponse, DeliveryError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(&self, url: &Url, body: Bytes) -> Result<BulkResponse, DeliveryError> {
        (**self).post(url, body).await
    }
}

/// [`Transport`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: get_client(config),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &Url, body: Bytes) -> Result<BulkResponse, DeliveryError> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len().to_string())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let fragments = stream::unfold(Some(response), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(response))),
                Ok(None) => None,
                Err(e) => Some((Err(DeliveryError::from(e)), None)),
            }
        })
        .boxed();

        Ok(BulkResponse { status, fragments })
    }
}

/// Builds the HTTP client used for deliveries.
///
/// An unusable proxy setting is logged and the client falls back to a direct
/// connection, so a misconfigured proxy never stops deliveries.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

// No client-wide timeout: the delivery deadline restarts exchanges itself.
fn build_client(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            client = client.proxy(reqwest::Proxy::https(https_uri.clone())?);
        }
    }

    Ok(client.build()?)
}
