// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use loggly_forwarder::token::PlaintextDecryptor;
use loggly_forwarder::{logger, Config, Forwarder, TokenCache};
use serde::Deserialize;
use std::error::Error;
use std::process;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

/// Subscription event as handed to a Lambda function.
#[derive(Deserialize)]
struct SubscriptionEvent {
    awslogs: AwsLogs,
}

#[derive(Deserialize)]
struct AwsLogs {
    data: String,
}

#[tokio::main]
pub async fn main() {
    let config = match Config::new() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = logger::init(&config.log_level) {
        eprintln!("Unable to set up logging: {e}");
        process::exit(1);
    }
    debug!("Logging subsystem enabled");

    if let Err(e) = run(config).await {
        error!("{e}");
        process::exit(1);
    }
}

/// Reads one subscription event from stdin and forwards it.
async fn run(config: Arc<Config>) -> Result<(), Box<dyn Error>> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let event: SubscriptionEvent = serde_json::from_str(&input)?;

    let tokens = TokenCache::from_base64(
        Arc::new(PlaintextDecryptor),
        config.require_encrypted_token()?,
    )?;
    let forwarder = Forwarder::from_config(Arc::clone(&config));

    forwarder
        .forward_streamed_payload(&event.awslogs.data, &tokens)
        .await?;
    info!("Subscription event forwarded");
    Ok(())
}
