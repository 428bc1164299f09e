use std::sync::Arc;
use tokio::time::Instant;

use super::{
    metrics::record_auth_operation, AuthError, Clock, CredentialStore, CredentialVerifier,
    PermissionRegistry, RefreshStateStore, TokenCodec, TokenIssuer, TokenRefresher,
    TokenVerifier,
};
use crate::config::TokenConfig;
use crate::models::{Claims, TokenPair};
use crate::utils::Password;

/// Entry point for the HTTP layer: login, refresh, verify and logout over
/// one shared codec, registry and refresh state store.
#[derive(Clone)]
pub struct LoginService {
    credentials: CredentialVerifier,
    issuer: TokenIssuer,
    refresher: TokenRefresher,
    verifier: TokenVerifier,
    refresh_store: Arc<dyn RefreshStateStore>,
}

impl LoginService {
    pub fn new(
        config: &TokenConfig,
        registry: PermissionRegistry,
        credential_store: Arc<dyn CredentialStore>,
        refresh_store: Arc<dyn RefreshStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        config.validate()?;

        let codec = TokenCodec::new(config, clock)?;
        let credentials = CredentialVerifier::new(credential_store)?;
        let issuer = TokenIssuer::new(codec.clone(), registry, refresh_store.clone(), config)?;
        let refresher = TokenRefresher::new(
            codec.clone(),
            issuer.clone(),
            refresh_store.clone(),
            config.enforce_rotation,
        );
        let verifier = TokenVerifier::new(codec);

        Ok(Self {
            credentials,
            issuer,
            refresher,
            verifier,
            refresh_store,
        })
    }

    pub async fn login(
        &self,
        login_id: &str,
        secret: &Password,
        deadline: Instant,
    ) -> Result<TokenPair, AuthError> {
        let result = async {
            let identity = self
                .credentials
                .authenticate(login_id, secret, deadline)
                .await?;
            self.issuer.issue(&identity, deadline).await
        }
        .await;

        observe("login", &result);
        result
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        deadline: Instant,
    ) -> Result<TokenPair, AuthError> {
        let result = self.refresher.refresh(refresh_token, deadline).await;
        observe("refresh", &result);
        result
    }

    pub fn verify(&self, access_token: &str) -> Result<Claims, AuthError> {
        let result = self.verifier.verify(access_token);
        observe("verify", &result);
        result
    }

    pub async fn logout(&self, refresh_token: &str, deadline: Instant) -> Result<(), AuthError> {
        let result = self.refresher.revoke(refresh_token, deadline).await;
        observe("logout", &result);
        result
    }

    pub async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.credentials.health_check().await?;
        self.refresh_store.health_check().await
    }
}

fn observe<T>(operation: &str, result: &Result<T, AuthError>) {
    match result {
        Ok(_) => record_auth_operation(operation, "success"),
        Err(err) => {
            record_auth_operation(operation, err.kind());
            if err.is_authentication_failure() {
                tracing::warn!(operation, reason = err.kind(), "Authentication rejected");
            } else {
                tracing::error!(operation, error = %err, "Authentication operation failed");
            }
        }
    }
}
