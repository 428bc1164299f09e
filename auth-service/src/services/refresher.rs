use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    deadline::within, AuthError, RefreshStateStore, RotateOutcome, TokenCodec, TokenIssuer,
};
use crate::models::{Claims, Identity, TokenKind, TokenPair};

/// Exchanges refresh tokens for new pairs and tracks family revocation.
///
/// With rotation enforced every refresh token is single-use: presenting one
/// that was already rotated away revokes its whole family.
#[derive(Clone)]
pub struct TokenRefresher {
    codec: TokenCodec,
    issuer: TokenIssuer,
    refresh_store: Arc<dyn RefreshStateStore>,
    enforce_rotation: bool,
}

impl TokenRefresher {
    pub fn new(
        codec: TokenCodec,
        issuer: TokenIssuer,
        refresh_store: Arc<dyn RefreshStateStore>,
        enforce_rotation: bool,
    ) -> Self {
        Self {
            codec,
            issuer,
            refresh_store,
            enforce_rotation,
        }
    }

    pub async fn refresh(&self, token: &str, deadline: Instant) -> Result<TokenPair, AuthError> {
        let claims = self.decode_refresh(token)?;
        let identity = Identity {
            subject: claims.sub.clone(),
            role: claims.role.clone(),
            customer_id: claims.customer_id.clone(),
        };

        // The role's grants may have changed since login.
        let permissions = self.issuer.permissions_for(&identity)?;

        if !self.enforce_rotation {
            let current =
                within(deadline, self.refresh_store.get_current(&claims.fam)).await?;
            if current.as_deref() != Some(claims.jti.as_str()) {
                return Err(AuthError::TokenRevoked);
            }

            let access_token = self.issuer.mint_access(&identity, permissions, &claims.fam)?;
            return Ok(TokenPair {
                access_token,
                refresh_token: token.to_string(),
                expires_in: self.issuer.access_token_expiry_seconds(),
            });
        }

        let next_id = Uuid::new_v4().to_string();
        let access_token = self
            .issuer
            .mint_access(&identity, permissions.clone(), &claims.fam)?;
        let refresh_token =
            self.issuer
                .mint_refresh(&identity, permissions, &claims.fam, &next_id)?;

        let outcome = within(
            deadline,
            self.refresh_store
                .rotate(&claims.fam, &claims.jti, &next_id),
        )
        .await?;

        match outcome {
            RotateOutcome::Rotated => {
                tracing::info!(
                    subject = %claims.sub,
                    family_id = %claims.fam,
                    "Rotated refresh token"
                );
                Ok(TokenPair {
                    access_token,
                    refresh_token,
                    expires_in: self.issuer.access_token_expiry_seconds(),
                })
            }
            RotateOutcome::Superseded => {
                tracing::warn!(
                    subject = %claims.sub,
                    family_id = %claims.fam,
                    "Refresh token reuse detected, family revoked"
                );
                Err(AuthError::TokenRevoked)
            }
            RotateOutcome::Missing => Err(AuthError::TokenRevoked),
        }
    }

    /// Revoke the family of a valid refresh token. Terminal for the family.
    pub async fn revoke(&self, token: &str, deadline: Instant) -> Result<(), AuthError> {
        let claims = self.decode_refresh(token)?;
        within(deadline, self.refresh_store.revoke(&claims.fam)).await?;

        tracing::info!(
            subject = %claims.sub,
            family_id = %claims.fam,
            "Revoked token family"
        );
        Ok(())
    }

    fn decode_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.codec.decode(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(claims)
    }
}
