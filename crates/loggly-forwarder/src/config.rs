// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::delivery::{DeliveryPolicy, DEFAULT_DELIVERY_DEADLINE};
use crate::error::ConfigError;
use std::env;
use std::time::Duration;

pub const DEFAULT_LOGGLY_HOST: &str = "logs-01.loggly.com";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Collector host, optionally with scheme and port.
    pub host: String,
    /// Tags attached to every streamed batch.
    pub tag: String,
    /// Base64 ciphertext of the customer token.
    pub encrypted_token: Option<String>,
    pub log_level: String,
    pub delivery_deadline: Duration,
    pub delivery_max_attempts: Option<u32>,
    pub https_proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_LOGGLY_HOST.to_string(),
            tag: String::new(),
            encrypted_token: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            delivery_deadline: DEFAULT_DELIVERY_DEADLINE,
            delivery_max_attempts: None,
            https_proxy: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn new() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup. Each setting
    /// accepts the camelCase Lambda name and an upper-case alias.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |names: &[&str]| {
            names
                .iter()
                .find_map(|&name| lookup(name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Config::default();

        let delivery_deadline = match read(&["LOGGLY_DELIVERY_DEADLINE_MS"]) {
            Some(raw) => {
                let millis = parse_positive("LOGGLY_DELIVERY_DEADLINE_MS", &raw)?;
                Duration::from_millis(u64::from(millis))
            }
            None => defaults.delivery_deadline,
        };
        let delivery_max_attempts = read(&["LOGGLY_DELIVERY_MAX_ATTEMPTS"])
            .map(|raw| parse_positive("LOGGLY_DELIVERY_MAX_ATTEMPTS", &raw))
            .transpose()?;

        Ok(Config {
            host: read(&["logglyHostName", "LOGGLY_HOST_NAME"]).unwrap_or(defaults.host),
            tag: read(&["logglyTags", "LOGGLY_TAGS"]).unwrap_or_default(),
            encrypted_token: read(&["kmsEncryptedCustomerToken", "KMS_ENCRYPTED_CUSTOMER_TOKEN"]),
            log_level: read(&["LOG_LEVEL"])
                .map(|level| level.to_lowercase())
                .unwrap_or(defaults.log_level),
            delivery_deadline,
            delivery_max_attempts,
            https_proxy: read(&["HTTPS_PROXY", "https_proxy"]),
        })
    }

    /// The encrypted token, required by the streamed path.
    pub fn require_encrypted_token(&self) -> Result<&str, ConfigError> {
        self.encrypted_token
            .as_deref()
            .ok_or(ConfigError::Missing("kmsEncryptedCustomerToken"))
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            deadline: self.delivery_deadline,
            max_attempts: self.delivery_max_attempts,
        }
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            message: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::Invalid {
            name,
            message: format!("{raw:?}: {e}"),
        }),
    }
}
