//! Durable storage of the bearer credential.
//!
//! The session authority is the only writer. Absence of either key is always
//! read as "logged out" / "not an operator", never as an error.

use std::sync::Arc;

use quorum_store::{KeyValueStore, StoreError};
use thiserror::Error;

pub const CREDENTIAL_KEY: &str = "auth.credential";
pub const PLATFORM_OPERATOR_KEY: &str = "auth.platform_operator";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential must not be empty")]
    Empty,

    #[error("credential storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Bearer credential plus the out-of-band platform-operator flag.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    token: String,
    is_platform_operator: bool,
}

impl StoredCredential {
    pub fn new(token: impl Into<String>, is_platform_operator: bool) -> Result<Self, CredentialError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self {
            token,
            is_platform_operator,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_platform_operator(&self) -> bool {
        self.is_platform_operator
    }
}

// Never print the token itself.
impl core::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("token", &"<redacted>")
            .field("is_platform_operator", &self.is_platform_operator)
            .finish()
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<StoredCredential> {
        let token = self.store.get(CREDENTIAL_KEY)?;
        let is_platform_operator = self
            .store
            .get(PLATFORM_OPERATOR_KEY)
            .is_some_and(|flag| flag == "true");

        StoredCredential::new(token, is_platform_operator).ok()
    }

    /// The raw token, for outbound request builders.
    pub fn token(&self) -> Option<String> {
        self.load().map(|c| c.token)
    }

    /// Persist both values. If the flag cannot be written the token is rolled
    /// back so a half-written credential is never replayed.
    pub fn save(&self, credential: &StoredCredential) -> Result<(), CredentialError> {
        self.store.set(CREDENTIAL_KEY, &credential.token)?;

        let flag_result = if credential.is_platform_operator {
            self.store.set(PLATFORM_OPERATOR_KEY, "true")
        } else {
            self.store.remove(PLATFORM_OPERATOR_KEY)
        };

        if let Err(err) = flag_result {
            if let Err(rollback) = self.store.remove(CREDENTIAL_KEY) {
                tracing::error!("failed to roll back credential after flag write failure: {rollback}");
            }
            return Err(err.into());
        }

        Ok(())
    }

    /// Remove both keys. Both removals are attempted even if the first fails.
    pub fn clear(&self) -> Result<(), CredentialError> {
        let token = self.store.remove(CREDENTIAL_KEY);
        let flag = self.store.remove(PLATFORM_OPERATOR_KEY);
        token?;
        flag?;
        Ok(())
    }
}

impl core::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
