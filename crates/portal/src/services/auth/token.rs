//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the caller's id, role, name and email.
//! The access gate verifies them on every request; nothing is stored
//! server-side.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warehub_core::{Role, UserId};

use crate::models::{Caller, User};

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "warehub_session";

/// A token that could not be signed or did not verify.
#[derive(Debug, Error)]
#[error("session token error: {0}")]
pub struct TokenError(#[from] jsonwebtoken::errors::Error);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    role: Role,
    name: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// Keys and lifetime for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_hours: u32) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl: Duration::hours(i64::from(ttl_hours)),
        }
    }

    /// Token lifetime, used for the cookie `Max-Age`.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.as_i32(),
            role: user.role,
            name: user.name.clone(),
            email: user.email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Verify a token and return the caller it identifies.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` for a bad signature, an expired token or
    /// malformed claims.
    pub fn verify(&self, token: &str) -> Result<Caller, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(Caller {
            id: UserId::new(data.claims.sub),
            role: data.claims.role,
            name: data.claims.name,
            email: data.claims.email,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use warehub_core::{Email, UserStatus};

    use super::*;
    use crate::models::BusinessProfile;

    fn keys() -> SessionKeys {
        SessionKeys::new(&SecretString::from("k".repeat(16) + &"Z9!q".repeat(8)), 1)
    }

    fn user() -> User {
        User {
            id: UserId::new(7),
            name: "Dana".to_owned(),
            email: Email::parse("dana@acme.test").unwrap(),
            role: Role::Customer,
            status: UserStatus::Active,
            profile: BusinessProfile::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issued_token_verifies() {
        let keys = keys();
        let caller = keys.verify(&keys.issue(&user()).unwrap()).unwrap();
        assert_eq!(caller.id, UserId::new(7));
        assert_eq!(caller.role, Role::Customer);
        assert_eq!(caller.email, "dana@acme.test");
    }

    #[test]
    fn test_token_from_other_key_is_rejected() {
        let token = keys().issue(&user()).unwrap();
        let other = SessionKeys::new(&SecretString::from("another-signing-key-0123456789AB"), 1);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(keys().verify("not.a.token").is_err());
    }
}
