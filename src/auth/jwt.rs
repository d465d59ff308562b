//! JWT token management
//!
//! Signs and verifies self-contained bearer tokens with a shared HMAC secret.

use crate::auth::Role;
use crate::error::{AppError, AuthError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Tokens live for a fixed 24 hours from issuance; there is no refresh.
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity ID)
    pub sub: Uuid,
    /// Role name as issued. Kept as a string so that a token carrying an
    /// unknown role still verifies and is then refused by the matrix.
    pub role: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and verifies tokens. Holds the only copy of the key material.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime: Duration::hours(TOKEN_LIFETIME_HOURS),
        }
    }

    /// Lifetime in seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Sign a fresh token for the given identity.
    pub fn issue(&self, subject: Uuid, role: Role, email: &str) -> Result<String, AppError> {
        self.issue_at(subject, role, email, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        subject: Uuid,
        role: Role,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: subject,
            role: role.as_str().to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature, structure and expiry.
    ///
    /// Every failure collapses into [`AuthError::InvalidToken`]; the reason
    /// only reaches the debug log.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => debug!("Rejected expired token"),
                    ErrorKind::InvalidSignature => debug!("Rejected token with bad signature"),
                    _ => debug!("Rejected malformed token: {}", e),
                }
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"unit-test-secret")
    }

    #[test]
    fn test_issue_then_verify_keeps_claims() {
        let codec = codec();
        let id = Uuid::new_v4();

        let token = codec.issue(id, Role::Finance, "j@x.com").unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "finance");
        assert_eq!(claims.email, "j@x.com");
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_HOURS * 3600);
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let codec = codec();
        let issued = Utc::now() - Duration::hours(TOKEN_LIFETIME_HOURS + 1);
        let token = codec
            .issue_at(Uuid::new_v4(), Role::Ceo, "ceo@x.com", issued)
            .unwrap();

        assert_eq!(codec.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_token_just_inside_lifetime_is_valid() {
        let codec = codec();
        let issued = Utc::now() - Duration::hours(TOKEN_LIFETIME_HOURS) + Duration::minutes(5);
        let token = codec
            .issue_at(Uuid::new_v4(), Role::Ceo, "ceo@x.com", issued)
            .unwrap();

        assert!(codec.verify(&token).is_ok());
    }

    #[test]
    fn test_forged_and_malformed_tokens_share_error() {
        let codec = codec();
        let other = TokenCodec::new(b"some-other-secret");
        let forged = other.issue(Uuid::new_v4(), Role::PropertyManager, "x@x.com").unwrap();

        assert_eq!(codec.verify(&forged), Err(AuthError::InvalidToken));
        assert_eq!(codec.verify("not.a.token"), Err(AuthError::InvalidToken));
        assert_eq!(codec.verify(""), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4(), Role::Assistant, "a@x.com").unwrap();
        // Property manager payload, untouched signature
        let escalated = TokenCodec::new(b"attacker")
            .issue(Uuid::new_v4(), Role::PropertyManager, "a@x.com")
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let payload = escalated.split('.').nth(1).unwrap();
        let spliced = format!("{}.{}.{}", parts[0], payload, parts[2]);

        assert_eq!(codec.verify(&spliced), Err(AuthError::InvalidToken));
    }
}
