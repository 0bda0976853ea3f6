//! Event signing collaborators.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use nostr::{Event, EventTemplate, finalize_event, generate_secret_key, get_public_key_hex};

/// Signs event templates on behalf of the user.
///
/// Implementations may be remote (extensions, bunkers), hence async.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn public_key(&self) -> Result<String>;

    async fn sign_event(&self, template: EventTemplate) -> Result<Event>;
}

/// Signer holding a secret key in memory.
pub struct LocalKeySigner {
    secret_key: [u8; 32],
    public_key: String,
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl LocalKeySigner {
    pub fn new(secret_key: [u8; 32]) -> Result<Self> {
        let public_key =
            get_public_key_hex(&secret_key).map_err(|e| ClientError::Signing(e.to_string()))?;
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Fresh random key.
    pub fn generate() -> Result<Self> {
        Self::new(generate_secret_key())
    }

    pub fn from_hex(secret_key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_key_hex.trim())
            .map_err(|e| ClientError::Signing(format!("invalid secret key hex: {}", e)))?;
        let secret_key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ClientError::Signing("secret key must be 32 bytes".to_string()))?;
        Self::new(secret_key)
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key
    }
}

#[async_trait]
impl Signer for LocalKeySigner {
    async fn public_key(&self) -> Result<String> {
        Ok(self.public_key.clone())
    }

    async fn sign_event(&self, template: EventTemplate) -> Result<Event> {
        finalize_event(&template, &self.secret_key).map_err(|e| ClientError::Signing(e.to_string()))
    }
}
