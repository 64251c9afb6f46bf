// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide cache for the decrypted customer token.
//!
//! The first caller triggers decryption; concurrent callers wait on the same
//! in-flight call instead of issuing their own. The outcome, failure
//! included, is kept until [`TokenCache::invalidate`] is called.

use crate::error::{ConfigError, DecryptError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, error};

/// Turns the encrypted token into its plaintext.
#[async_trait]
pub trait TokenDecryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<String, DecryptError>;
}

/// Treats the "ciphertext" as the token itself. Meant for local replays where
/// no key management service is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDecryptor;

#[async_trait]
impl TokenDecryptor for PlaintextDecryptor {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<String, DecryptError> {
        String::from_utf8(ciphertext.to_vec())
            .map_err(|e| DecryptError(format!("token is not valid UTF-8: {e}")))
    }
}

type TokenCell = OnceCell<Result<String, DecryptError>>;

pub struct TokenCache {
    decryptor: Arc<dyn TokenDecryptor>,
    ciphertext: Vec<u8>,
    cell: RwLock<Arc<TokenCell>>,
}

impl TokenCache {
    pub fn new(decryptor: Arc<dyn TokenDecryptor>, ciphertext: Vec<u8>) -> Self {
        Self {
            decryptor,
            ciphertext,
            cell: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    /// Builds a cache from the base64 ciphertext found in the configuration.
    pub fn from_base64(
        decryptor: Arc<dyn TokenDecryptor>,
        encoded: &str,
    ) -> Result<Self, ConfigError> {
        let ciphertext = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::Invalid {
                name: "kmsEncryptedCustomerToken",
                message: e.to_string(),
            })?;
        Ok(Self::new(decryptor, ciphertext))
    }

    /// Returns the decrypted token, decrypting at most once per cache generation.
    pub async fn get_token(&self) -> Result<String, DecryptError> {
        let cell = {
            #[allow(clippy::expect_used)]
            let guard = self.cell.read().expect("lock poisoned");
            Arc::clone(&guard)
        };
        cell.get_or_init(|| async {
            debug!("Decrypting customer token");
            let result = self.decryptor.decrypt(&self.ciphertext).await;
            if let Err(e) = &result {
                error!("{e}");
            }
            result
        })
        .await
        .clone()
    }

    /// Forgets the cached outcome; the next [`get_token`](Self::get_token)
    /// decrypts again. Callers already waiting keep the previous generation.
    pub fn invalidate(&self) {
        #[allow(clippy::expect_used)]
        let mut guard = self.cell.write().expect("lock poisoned");
        *guard = Arc::new(OnceCell::new());
    }
}

impl Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenCache")
    }
}
