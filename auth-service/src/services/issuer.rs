use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    deadline::within, AuthError, PermissionRegistry, RefreshStateStore, TokenCodec,
};
use crate::config::TokenConfig;
use crate::models::{Claims, Identity, TokenKind, TokenPair};

/// Mints access/refresh pairs for authenticated identities.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    registry: PermissionRegistry,
    refresh_store: Arc<dyn RefreshStateStore>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(
        codec: TokenCodec,
        registry: PermissionRegistry,
        refresh_store: Arc<dyn RefreshStateStore>,
        config: &TokenConfig,
    ) -> Result<Self, anyhow::Error> {
        let access_lifetime = Duration::try_minutes(config.access_token_expiry_minutes)
            .ok_or_else(|| anyhow::anyhow!("access token lifetime is out of range"))?;
        let refresh_lifetime = Duration::try_days(config.refresh_token_expiry_days)
            .ok_or_else(|| anyhow::anyhow!("refresh token lifetime is out of range"))?;

        Ok(Self {
            codec,
            registry,
            refresh_store,
            access_lifetime,
            refresh_lifetime,
        })
    }

    /// Start a new token family for `identity`.
    ///
    /// The family's refresh id is persisted last; if that write fails or the
    /// deadline passes, no token leaves this function.
    pub async fn issue(
        &self,
        identity: &Identity,
        deadline: Instant,
    ) -> Result<TokenPair, AuthError> {
        let permissions = self.permissions_for(identity)?;
        let family_id = Uuid::new_v4().to_string();
        let refresh_id = Uuid::new_v4().to_string();

        let access_token = self.mint_access(identity, permissions.clone(), &family_id)?;
        let refresh_token = self.mint_refresh(identity, permissions, &family_id, &refresh_id)?;

        within(
            deadline,
            self.refresh_store.set_current(&family_id, &refresh_id),
        )
        .await?;

        tracing::info!(
            subject = %identity.subject,
            role = %identity.role,
            family_id = %family_id,
            "Issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_token_expiry_seconds(),
        })
    }

    /// Permissions currently granted to the identity's role.
    pub fn permissions_for(&self, identity: &Identity) -> Result<BTreeSet<String>, AuthError> {
        self.registry.permissions_for_role(&identity.role)
    }

    pub(crate) fn mint_access(
        &self,
        identity: &Identity,
        permissions: BTreeSet<String>,
        family_id: &str,
    ) -> Result<String, AuthError> {
        let claims = self.claims(
            identity,
            permissions,
            TokenKind::Access,
            family_id,
            &Uuid::new_v4().to_string(),
            self.access_lifetime,
        );
        self.codec.encode(&claims)
    }

    pub(crate) fn mint_refresh(
        &self,
        identity: &Identity,
        permissions: BTreeSet<String>,
        family_id: &str,
        token_id: &str,
    ) -> Result<String, AuthError> {
        let claims = self.claims(
            identity,
            permissions,
            TokenKind::Refresh,
            family_id,
            token_id,
            self.refresh_lifetime,
        );
        self.codec.encode(&claims)
    }

    fn claims(
        &self,
        identity: &Identity,
        permissions: BTreeSet<String>,
        kind: TokenKind,
        family_id: &str,
        token_id: &str,
        lifetime: Duration,
    ) -> Claims {
        let now = self.codec.now();
        Claims {
            sub: identity.subject.clone(),
            role: identity.role.clone(),
            permissions,
            iat: now,
            exp: now + lifetime.num_seconds(),
            kind,
            fam: family_id.to_string(),
            jti: token_id.to_string(),
            customer_id: identity.customer_id.clone(),
        }
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_lifetime.num_seconds()
    }
}
