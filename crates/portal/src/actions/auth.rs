//! Login and registration.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::clients::ProfileFields;
use super::{ActionError, ActionResult, Validator};
use crate::db::RepositoryError;
use crate::middleware::gate::landing_path;
use crate::models::User;
use crate::services::auth::MIN_PASSWORD_LENGTH;
use crate::services::{AuthError, AuthService, View};
use crate::state::AppState;

impl From<AuthError> for ActionError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidEmail(e) => Self::field("email", e.to_string()),
            AuthError::InvalidCredentials => Self::field("email", "Invalid email or password"),
            AuthError::AccountInactive => Self::field(
                "email",
                "This account is awaiting approval or has been deactivated",
            ),
            AuthError::UserNotFound | AuthError::Repository(RepositoryError::NotFound) => {
                Self::NotFound("User")
            }
            AuthError::UserAlreadyExists => Self::field("email", "This email is already in use"),
            AuthError::WeakPassword(_) => Self::field(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            ),
            AuthError::Repository(e) => Self::from_store("User")(e),
            e @ (AuthError::Token(_) | AuthError::PasswordHash) => Self::dependency("auth", &e),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

/// A successful login. The token goes into the session cookie, not the body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub user: User,
    pub landing_path: &'static str,
    #[serde(skip)]
    pub token: String,
}

#[instrument(skip(state, form), fields(email = %form.email.trim()))]
pub async fn login(state: &AppState, form: LoginForm) -> ActionResult<LoginOutcome> {
    let mut v = Validator::new();
    let email = v.required("email", "Email", &form.email);
    v.check(!form.password.is_empty(), "password", "Password is required");
    v.finish()?;

    let user = AuthService::new(state.db().users())
        .login(&email, &form.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "Login refused"))?;
    let token = state
        .sessions()
        .issue(&user)
        .map_err(|e| ActionError::dependency("session token", &e))?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(LoginOutcome {
        landing_path: landing_path(user.role),
        user,
        token,
    })
}

/// Register a customer account. It stays `PENDING` until an admin approves it.
#[instrument(skip(state, form), fields(email = %form.email.trim()))]
pub async fn register(state: &AppState, form: RegisterForm) -> ActionResult<User> {
    let mut v = Validator::new();
    let name = v.required("name", "Name", &form.name);
    let email = v.email("email", &form.email);
    v.check(
        form.password.chars().count() >= MIN_PASSWORD_LENGTH,
        "password",
        &format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
    );
    let profile = form.profile.validate(&mut v);
    v.finish()?;

    let email = email.map(|e| e.to_string()).unwrap_or_default();
    let user = AuthService::new(state.db().users())
        .register(name, &email, &form.password, profile)
        .await?;
    state.views().invalidate(&[View::Clients, View::Analytics]);

    tracing::info!(user_id = %user.id, "Customer registered");
    Ok(user)
}
