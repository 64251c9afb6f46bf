// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end handling of one invocation: decode, parse, deliver.

use crate::access_log::parse_access_log;
use crate::app_log::ApplicationLogParser;
use crate::config::Config;
use crate::delivery::BulkClient;
use crate::error::{ForwarderError, SourceError};
use crate::event::{DeliveryTarget, ParsedBatch};
use crate::payload::{decode_object_body, ObjectRef, StreamedBatch};
use crate::token::TokenCache;
use crate::transport::{HttpTransport, Transport};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// Bucket tag holding the customer token for stored access logs.
pub const CUSTOMER_TOKEN_TAG: &str = "loggly-customer-token";
/// Bucket tag holding the Loggly tag for stored access logs.
pub const LOGGLY_TAG_TAG: &str = "loggly-tag";

/// Storage holding access log objects.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Raw bytes of the object, still compressed if stored that way.
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, SourceError>;

    async fn bucket_tags(&self, bucket: &str) -> Result<HashMap<String, String>, SourceError>;
}

pub struct Forwarder<T = HttpTransport> {
    client: BulkClient<T>,
    config: Arc<Config>,
    parser: ApplicationLogParser,
}

impl Forwarder<HttpTransport> {
    pub fn from_config(config: Arc<Config>) -> Self {
        let client = BulkClient::new(HttpTransport::new(&config), config.delivery_policy());
        Self::new(client, config)
    }
}

impl<T: Transport> Forwarder<T> {
    pub fn new(client: BulkClient<T>, config: Arc<Config>) -> Self {
        Self {
            client,
            config,
            parser: ApplicationLogParser::default(),
        }
    }

    /// Handles the `awslogs.data` field of a subscription event, delivering
    /// under the cached customer token and the configured tag.
    pub async fn forward_streamed_payload(
        &self,
        data: &str,
        tokens: &TokenCache,
    ) -> Result<(), ForwarderError> {
        let batch = StreamedBatch::decode(data)?;
        let token = tokens.get_token().await?;
        let target = DeliveryTarget::new(token, self.config.tag.clone(), self.config.host.clone());
        self.forward_streamed(&batch, &target).await
    }

    pub async fn forward_streamed(
        &self,
        batch: &StreamedBatch,
        target: &DeliveryTarget,
    ) -> Result<(), ForwarderError> {
        let events = self
            .parser
            .parse_batch(&batch.log_events, &batch.log_group, &batch.log_stream);
        self.deliver(target, &events)
            .instrument(info_span!("stream", group = %batch.log_group))
            .await
    }

    /// Forwards every object concurrently. Resolves with the first failure;
    /// exchanges still running at that point are dropped.
    pub async fn forward_stored_objects(
        &self,
        objects: &[ObjectRef],
        source: &dyn ObjectSource,
    ) -> Result<(), ForwarderError> {
        try_join_all(objects.iter().map(|object| {
            self.forward_stored_object(object, source)
                .instrument(info_span!("object", bucket = %object.bucket, key = %object.key))
        }))
        .await?;
        Ok(())
    }

    async fn forward_stored_object(
        &self,
        object: &ObjectRef,
        source: &dyn ObjectSource,
    ) -> Result<(), ForwarderError> {
        let (body, tags) = futures::try_join!(source.fetch(object), source.bucket_tags(&object.bucket))?;
        let text = decode_object_body(object, &body)?;
        let events = parse_access_log(&text)?;

        let target = DeliveryTarget::new(
            tag_or_empty(&tags, CUSTOMER_TOKEN_TAG),
            tag_or_empty(&tags, LOGGLY_TAG_TAG),
            self.config.host.clone(),
        );
        self.deliver(&target, &events).await
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        events: &ParsedBatch,
    ) -> Result<(), ForwarderError> {
        debug!("PIPELINE | Forwarding {} events", events.len());
        self.client.deliver(target, events).await?;
        Ok(())
    }
}

fn tag_or_empty(tags: &HashMap<String, String>, name: &str) -> String {
    match tags.get(name) {
        Some(value) => value.clone(),
        None => {
            warn!("PIPELINE | Bucket has no {name} tag");
            String::new()
        }
    }
}
