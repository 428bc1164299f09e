use super::{AuthError, TokenCodec};
use crate::models::{Claims, TokenKind};

/// Read-only attestation that a bearer token is authentic, fresh and an
/// access token. Authorization decisions belong to the caller.
#[derive(Clone)]
pub struct TokenVerifier {
    codec: TokenCodec,
}

impl TokenVerifier {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.codec.decode(token)?;

        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenKind);
        }

        Ok(claims)
    }
}
