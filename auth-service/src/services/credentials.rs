use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Instant;

use super::{deadline::within, AuthError};
use crate::models::{CredentialRecord, Identity};
use crate::utils::{decoy_password_hash, verify_password, Password, PasswordHashString};

/// Read-only lookup into the user credential store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(&self, login_id: &str) -> Result<Option<CredentialRecord>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

/// Credential store held in memory, for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: DashMap<String, CredentialRecord>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: CredentialRecord) {
        self.records.insert(record.login_id.clone(), record);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup(&self, login_id: &str) -> Result<Option<CredentialRecord>, anyhow::Error> {
        Ok(self.records.get(login_id).map(|r| r.value().clone()))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// Checks a login identifier and secret against the credential store.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self, anyhow::Error> {
        // Computed up front so the first unknown-user login pays no extra cost.
        decoy_password_hash()?;
        Ok(Self { store })
    }

    /// Unknown identifiers and wrong secrets both fail with
    /// `InvalidCredentials` after exactly one hash verification.
    pub async fn authenticate(
        &self,
        login_id: &str,
        secret: &Password,
        deadline: Instant,
    ) -> Result<Identity, AuthError> {
        let record = within(deadline, self.store.lookup(login_id)).await?;

        match record {
            Some(record) => {
                let stored = PasswordHashString::new(record.secret_hash.clone());
                if !stored.is_argon2() {
                    tracing::warn!(
                        login_id = %login_id,
                        "Stored credential hash is not a valid Argon2 PHC string"
                    );
                    return Self::reject_with_decoy(secret);
                }
                verify_password(secret, &stored).map_err(|_| AuthError::InvalidCredentials)?;
                Ok(Identity::from(&record))
            }
            None => Self::reject_with_decoy(secret),
        }
    }

    fn reject_with_decoy(secret: &Password) -> Result<Identity, AuthError> {
        let decoy = decoy_password_hash()?;
        let _ = verify_password(secret, decoy);
        Err(AuthError::InvalidCredentials)
    }

    pub async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.store.health_check().await
    }
}
