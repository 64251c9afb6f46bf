// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards AWS log deliveries to Loggly.
//!
//! Two inputs are handled:
//! - CloudWatch Logs subscription batches, decoded by [`payload`] and turned
//!   into events by [`app_log`];
//! - ELB and ALB access log objects stored in S3, parsed line by line by
//!   [`access_log`].
//!
//! Both end up as a [`ParsedBatch`] that [`delivery`] posts to the Loggly
//! bulk endpoint. [`forwarder`] ties the steps together.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod access_log;
pub mod app_log;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod logger;
pub mod payload;
pub mod token;
pub mod tokenizer;
pub mod transport;

pub use config::Config;
pub use delivery::{BulkClient, DeliveryPolicy};
pub use error::ForwarderError;
pub use event::{DeliveryTarget, LogEvent, ParsedBatch};
pub use forwarder::{Forwarder, ObjectSource};
pub use payload::{ObjectRef, StreamedBatch};
pub use token::{TokenCache, TokenDecryptor};
