use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{AuthError, Clock};
use crate::config::TokenConfig;
use crate::models::Claims;

type HmacSha256 = Hmac<Sha256>;

/// HS256 codec for access and refresh tokens.
///
/// Tokens use the compact JWT layout `header.payload.signature`. Decoding
/// authenticates the signing input in constant time before any claim is read.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    mac: HmacSha256,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Result<Self, anyhow::Error> {
        let secret = config.signing_key.expose_secret().as_bytes();
        if secret.len() < TokenConfig::MIN_SIGNING_KEY_BYTES {
            return Err(anyhow::anyhow!(
                "Signing key must be at least {} bytes",
                TokenConfig::MIN_SIGNING_KEY_BYTES
            ));
        }

        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;

        // Expiry is checked against the injected clock after decoding.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        tracing::info!("Token codec initialized with HS256 key");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            mac,
            validation,
            clock,
        })
    }

    /// Current time in whole seconds, as stored in `iat`/`exp`.
    pub fn now(&self) -> i64 {
        self.clock.now().timestamp()
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        if claims.exp <= claims.iat {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "Token expiry must be after its issue time"
            )));
        }

        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Authenticate and decode a token, rejecting it once `now >= exp`.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_signature(token)?;

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })?
            .claims;

        if claims.exp <= claims.iat {
            return Err(AuthError::MalformedToken);
        }

        if claims.is_expired_at(self.now()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Check the signature over the raw signing input. Any altered byte,
    /// including in the header, fails here rather than in JSON parsing.
    fn verify_signature(&self, token: &str) -> Result<(), AuthError> {
        let (signing_input, signature) =
            token.rsplit_once('.').ok_or(AuthError::MalformedToken)?;

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        let expected = mac.finalize().into_bytes();

        if expected.len() != provided.len() {
            return Err(AuthError::InvalidSignature);
        }

        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Ok(())
        } else {
            Err(AuthError::InvalidSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenKind;
    use crate::services::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use secrecy::SecretString;

    const TEST_KEY: &str = "test-signing-key-with-at-least-32-bytes!";

    fn config(key: &str) -> TokenConfig {
        TokenConfig {
            signing_key: SecretString::new(key.to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
            enforce_rotation: true,
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    fn claims(iat: i64, exp: i64) -> Claims {
        Claims {
            sub: "alice".to_string(),
            role: "teller".to_string(),
            permissions: ["transfer", "view_balance"]
                .into_iter()
                .map(String::from)
                .collect(),
            iat,
            exp,
            kind: TokenKind::Access,
            fam: "family-1".to_string(),
            jti: "token-1".to_string(),
            customer_id: None,
        }
    }

    #[test]
    fn rejects_short_signing_key() {
        assert!(TokenCodec::new(&config("too-short"), clock()).is_err());
    }

    #[test]
    fn encode_then_decode_returns_claims() -> Result<(), anyhow::Error> {
        let clock = clock();
        let codec = TokenCodec::new(&config(TEST_KEY), clock.clone())?;
        let now = codec.now();
        let original = claims(now, now + 900);

        let token = codec.encode(&original)?;
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token)?, original);
        Ok(())
    }

    #[test]
    fn every_single_byte_flip_is_an_invalid_signature() -> Result<(), anyhow::Error> {
        let codec = TokenCodec::new(&config(TEST_KEY), clock())?;
        let now = codec.now();
        let token = codec.encode(&claims(now, now + 900))?;

        for position in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[position] ^= 0x01;
            let tampered = String::from_utf8(bytes)?;

            match codec.decode(&tampered) {
                Err(AuthError::InvalidSignature) => {}
                other => panic!(
                    "byte {} flipped: expected InvalidSignature, got {:?}",
                    position, other
                ),
            }
        }
        Ok(())
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() -> Result<(), anyhow::Error> {
        let clock = clock();
        let ours = TokenCodec::new(&config(TEST_KEY), clock.clone())?;
        let theirs = TokenCodec::new(&config("another-signing-key-also-32-bytes-long"), clock)?;
        let now = ours.now();

        let token = theirs.encode(&claims(now, now + 900))?;
        assert!(matches!(ours.decode(&token), Err(AuthError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn token_expires_exactly_at_exp() -> Result<(), anyhow::Error> {
        let clock = clock();
        let codec = TokenCodec::new(&config(TEST_KEY), clock.clone())?;
        let now = codec.now();
        let token = codec.encode(&claims(now, now + 60))?;

        clock.advance(Duration::seconds(59));
        assert!(codec.decode(&token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(codec.decode(&token), Err(AuthError::TokenExpired)));
        Ok(())
    }

    #[test]
    fn garbage_is_malformed_or_unsigned() {
        let codec = TokenCodec::new(&config(TEST_KEY), clock()).unwrap();
        assert!(matches!(codec.decode("not-a-token"), Err(AuthError::MalformedToken)));
        assert!(matches!(codec.decode("a.b.c"), Err(AuthError::InvalidSignature)));
        assert!(matches!(codec.decode(""), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn signed_but_unparseable_payload_is_malformed() -> Result<(), anyhow::Error> {
        let codec = TokenCodec::new(&config(TEST_KEY), clock())?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"sub":"alice"}"#)
        );
        let mut mac = HmacSha256::new_from_slice(TEST_KEY.as_bytes())
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        mac.update(signing_input.as_bytes());
        let token = format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        );

        assert!(matches!(codec.decode(&token), Err(AuthError::MalformedToken)));
        Ok(())
    }

    #[test]
    fn refuses_to_encode_non_positive_lifetime() {
        let codec = TokenCodec::new(&config(TEST_KEY), clock()).unwrap();
        let now = codec.now();
        assert!(matches!(
            codec.encode(&claims(now, now)),
            Err(AuthError::Internal(_))
        ));
    }
}
