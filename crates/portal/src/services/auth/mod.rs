//! Authentication service.
//!
//! Password accounts hashed with Argon2id, plus signed session tokens
//! (see [`token`]).

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{SESSION_COOKIE, SessionKeys, TokenError};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use warehub_core::{Email, Role, UserId, UserStatus};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{BusinessProfile, NewUser, User};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
///
/// Handles registration, login and password changes over any
/// [`UserRepository`].
pub struct AuthService<'a> {
    users: &'a dyn UserRepository,
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub name: String,
    pub email: &'a str,
    /// `None` creates an account that cannot log in until a password is set.
    pub password: Option<&'a str>,
    pub role: Role,
    pub status: UserStatus,
    pub profile: BusinessProfile,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserRepository) -> Self {
        Self { users }
    }

    /// Create an account, hashing its password if one is given.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn create_account(&self, account: NewAccount<'_>) -> Result<User, AuthError> {
        let email = Email::parse(account.email)?;

        let password_hash = match account.password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        self.users
            .create(NewUser {
                name: account.name,
                email,
                password_hash,
                role: account.role,
                status: account.status,
                profile: account.profile,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Register a customer. New customers wait in `PENDING` for approval.
    ///
    /// # Errors
    ///
    /// See [`Self::create_account`].
    pub async fn register(
        &self,
        name: String,
        email: &str,
        password: &str,
        profile: BusinessProfile,
    ) -> Result<User, AuthError> {
        self.create_account(NewAccount {
            name,
            email,
            password: Some(password),
            role: Role::Customer,
            status: UserStatus::Pending,
            profile,
        })
        .await
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountInactive` if the password is right but the
    /// account is not `ACTIVE`.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = self
            .users
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = credentials
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, hash)?;

        if !credentials.user.can_log_in() {
            return Err(AuthError::AccountInactive);
        }
        Ok(credentials.user)
    }

    /// Change a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    pub async fn change_password(
        &self,
        user: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self
            .users
            .password_hash(user)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(current, &hash)?;
        validate_password(new)?;

        self.users
            .set_password_hash(user, &hash_password(new)?)
            .await?;
        Ok(())
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDatabase;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_is_weak() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_customer_cannot_log_in() {
        let db = MemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.register(
            "Dana".to_owned(),
            "dana@acme.test",
            "longenough",
            BusinessProfile::default(),
        )
        .await
        .unwrap();

        assert!(matches!(
            auth.login("dana@acme.test", "longenough").await,
            Err(AuthError::AccountInactive)
        ));
        assert!(matches!(
            auth.login("dana@acme.test", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let db = MemoryDatabase::new();
        let auth = AuthService::new(&db);
        let account = || NewAccount {
            name: "Ops".to_owned(),
            email: "ops@warehub.test",
            password: Some("longenough"),
            role: Role::Admin,
            status: UserStatus::Active,
            profile: BusinessProfile::default(),
        };
        auth.create_account(account()).await.unwrap();
        assert!(matches!(
            auth.create_account(account()).await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let db = MemoryDatabase::new();
        let auth = AuthService::new(&db);
        let user = auth
            .create_account(NewAccount {
                name: "Ops".to_owned(),
                email: "ops@warehub.test",
                password: Some("first-pass"),
                role: Role::Admin,
                status: UserStatus::Active,
                profile: BusinessProfile::default(),
            })
            .await
            .unwrap();

        auth.change_password(user.id, "first-pass", "second-pass")
            .await
            .unwrap();
        assert!(auth.login("ops@warehub.test", "second-pass").await.is_ok());
        assert!(auth.login("ops@warehub.test", "first-pass").await.is_err());
    }
}
