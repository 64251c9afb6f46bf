// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{write::GzEncoder, Compression};
use loggly_forwarder::{BulkClient, Config, DeliveryPolicy, Forwarder};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

pub const CLASSIC_LINE: &str = r#"2015-05-13T23:39:43.945958Z my-loadbalancer 192.168.131.39:2817 10.0.0.1:80 0.000086 0.001048 0.001337 200 200 0 57 "GET https://www.example.com:443/ HTTP/1.1" "curl/7.38.0" DHE-RSA-AES128-SHA TLSv1.2"#;

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Builds the `awslogs.data` value of a subscription event.
pub fn subscription_data(json: &str) -> String {
    STANDARD.encode(gzip(json.as_bytes()))
}

/// One attempt, short deadline: a misbehaving test fails instead of hanging.
pub fn test_policy() -> DeliveryPolicy {
    DeliveryPolicy {
        deadline: Duration::from_secs(5),
        max_attempts: Some(1),
    }
}

pub fn test_config(host: String, tag: &str) -> Arc<Config> {
    Arc::new(Config {
        host,
        tag: tag.to_string(),
        ..Config::default()
    })
}

pub fn bulk_client(config: &Config) -> BulkClient {
    BulkClient::new(loggly_forwarder::transport::HttpTransport::new(config), test_policy())
}

pub fn forwarder(config: Arc<Config>) -> Forwarder {
    Forwarder::new(bulk_client(&config), config)
}
