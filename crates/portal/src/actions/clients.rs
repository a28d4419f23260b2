//! Client (customer account) actions, staff provisioning and the caller's
//! own profile.

use serde::Deserialize;
use tracing::instrument;

use warehub_core::{Capability, Role, UserId, UserStatus};

use super::{ActionError, ActionResult, ListQuery, Listing, StatusForm, Validator, listing_key};
use crate::db::RepositoryError;
use crate::models::{BusinessProfile, Caller, ClientStats, User, UserFilter};
use crate::services::auth::{MIN_PASSWORD_LENGTH, NewAccount};
use crate::services::{AuthError, AuthService, View};
use crate::state::AppState;

const ENTITY: &str = "Client";

pub type ClientListing = Listing<User, ClientStats>;

/// Views that show a client's name or status.
const CLIENT_VIEWS: &[View] = &[
    View::Clients,
    View::Agreements,
    View::Invoices,
    View::Tickets,
    View::Analytics,
];

/// Optional business details, shared by every form that edits a profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileFields {
    pub company_name: String,
    pub business_type: String,
    pub phone: String,
    pub address: String,
}

impl ProfileFields {
    pub(crate) fn validate(&self, v: &mut Validator) -> BusinessProfile {
        BusinessProfile {
            company_name: v.optional("companyName", "Company name", &self.company_name),
            business_type: v.optional("businessType", "Business type", &self.business_type),
            phone: v.optional("phone", "Phone", &self.phone),
            address: v.optional("address", "Address", &self.address),
        }
    }
}

/// An account created by an admin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountForm {
    pub name: String,
    pub email: String,
    /// Optional for clients, required for admins.
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileForm {
    pub name: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
}

struct ValidAccount {
    name: String,
    email: String,
    password: Option<String>,
    profile: BusinessProfile,
}

impl AccountForm {
    fn validate(&self, password_required: bool) -> ActionResult<ValidAccount> {
        let mut v = Validator::new();
        let name = v.required("name", "Name", &self.name);
        let email = v.email("email", &self.email);
        let password = (!self.password.is_empty()).then(|| self.password.clone());
        match &password {
            None if password_required => v.fail("password", "Password is required"),
            Some(p) if p.chars().count() < MIN_PASSWORD_LENGTH => v.fail(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            ),
            _ => {}
        }
        let profile = self.profile.validate(&mut v);
        v.finish()?;

        Ok(ValidAccount {
            name,
            email: email.map(|e| e.to_string()).unwrap_or_default(),
            password,
            profile,
        })
    }
}

impl ProfileForm {
    fn validate(&self) -> ActionResult<(String, BusinessProfile)> {
        let mut v = Validator::new();
        let name = v.required("name", "Name", &self.name);
        let profile = self.profile.validate(&mut v);
        v.finish()?;
        Ok((name, profile))
    }
}

/// Fetch a user and check they are a customer.
async fn customer(state: &AppState, id: UserId) -> ActionResult<User> {
    state
        .db()
        .users()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .filter(|u| u.role == Role::Customer)
        .ok_or(ActionError::NotFound(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<ClientListing> {
    caller.require(Capability::ManageClients)?;

    let mut v = Validator::new();
    let filter = UserFilter {
        search: query.search(),
        status: v.parse_optional("status", "Status", query.status.as_deref().unwrap_or_default()),
        role: Some(Role::Customer),
    };
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Clients, listing_key(&filter, page), || async {
            let items = db.users().list(&filter, page).await?;
            let stats = db.users().stats(Role::Customer).await?;
            Ok::<_, RepositoryError>(Listing { page: items, stats })
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(state: &AppState, caller: &Caller, id: UserId) -> ActionResult<User> {
    caller.require(Capability::ManageClients)?;
    customer(state, id).await
}

/// Create an active customer. Without a password the client cannot log in
/// until one is set.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn create(state: &AppState, caller: &Caller, form: AccountForm) -> ActionResult<User> {
    let account = form.validate(false)?;
    caller.require(Capability::ManageClients)?;

    let user = AuthService::new(state.db().users())
        .create_account(NewAccount {
            name: account.name,
            email: &account.email,
            password: account.password.as_deref(),
            role: Role::Customer,
            status: UserStatus::Active,
            profile: account.profile,
        })
        .await?;
    state.views().invalidate(&[View::Clients, View::Analytics]);

    tracing::info!(client_id = %user.id, "Client created");
    Ok(user)
}

/// Create a staff account.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn create_admin(state: &AppState, caller: &Caller, form: AccountForm) -> ActionResult<User> {
    let account = form.validate(true)?;
    caller.require(Capability::ManageStaff)?;

    let user = AuthService::new(state.db().users())
        .create_account(NewAccount {
            name: account.name,
            email: &account.email,
            password: account.password.as_deref(),
            role: Role::Admin,
            status: UserStatus::Active,
            profile: account.profile,
        })
        .await?;

    tracing::info!(admin_id = %user.id, created_by = %caller.id, "Admin account created");
    Ok(user)
}

#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn update(
    state: &AppState,
    caller: &Caller,
    id: UserId,
    form: ProfileForm,
) -> ActionResult<User> {
    let (name, profile) = form.validate()?;
    caller.require(Capability::ManageClients)?;
    customer(state, id).await?;

    let user = state
        .db()
        .users()
        .update_profile(id, &name, &profile)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(CLIENT_VIEWS);

    tracing::info!(client_id = %user.id, "Client updated");
    Ok(user)
}

/// Approve, suspend or reactivate a client.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn set_status(
    state: &AppState,
    caller: &Caller,
    id: UserId,
    form: StatusForm,
) -> ActionResult<User> {
    let mut v = Validator::new();
    let status = v.parse::<UserStatus>("status", "Status", &form.status);
    v.finish()?;
    caller.require(Capability::ManageClients)?;
    customer(state, id).await?;

    let user = state
        .db()
        .users()
        .set_status(id, status.unwrap_or(UserStatus::Pending))
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(CLIENT_VIEWS);

    tracing::info!(client_id = %user.id, status = %user.status, "Client status changed");
    Ok(user)
}

/// Delete a client. Refused while they have agreements.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(state: &AppState, caller: &Caller, id: UserId) -> ActionResult<()> {
    caller.require(Capability::ManageClients)?;
    customer(state, id).await?;

    state
        .db()
        .users()
        .delete(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(CLIENT_VIEWS);

    tracing::info!(client_id = %id, "Client deleted");
    Ok(())
}

// =============================================================================
// Own profile
// =============================================================================

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn profile(state: &AppState, caller: &Caller) -> ActionResult<User> {
    caller.require(Capability::EditOwnProfile)?;
    state
        .db()
        .users()
        .get(caller.id)
        .await
        .map_err(ActionError::from_store("User"))?
        .ok_or(ActionError::NotFound("User"))
}

#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn update_profile(state: &AppState, caller: &Caller, form: ProfileForm) -> ActionResult<User> {
    let (name, profile) = form.validate()?;
    caller.require(Capability::EditOwnProfile)?;

    let user = state
        .db()
        .users()
        .update_profile(caller.id, &name, &profile)
        .await
        .map_err(ActionError::from_store("User"))?;
    state.views().invalidate(CLIENT_VIEWS);

    tracing::info!("Profile updated");
    Ok(user)
}

#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn change_password(state: &AppState, caller: &Caller, form: PasswordForm) -> ActionResult<()> {
    let mut v = Validator::new();
    v.check(
        !form.current_password.is_empty(),
        "currentPassword",
        "Current password is required",
    );
    v.check(
        form.new_password.chars().count() >= MIN_PASSWORD_LENGTH,
        "newPassword",
        &format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
    );
    v.finish()?;
    caller.require(Capability::EditOwnProfile)?;

    AuthService::new(state.db().users())
        .change_password(caller.id, &form.current_password, &form.new_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                ActionError::field("currentPassword", "Current password is incorrect")
            }
            other => other.into(),
        })?;

    tracing::info!("Password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> AccountForm {
        AccountForm {
            name: "Dana Reyes".to_owned(),
            email: " Dana@Example.COM ".to_owned(),
            profile: ProfileFields {
                company_name: "Reyes Freight".to_owned(),
                ..ProfileFields::default()
            },
            ..AccountForm::default()
        }
    }

    #[test]
    fn test_client_password_is_optional() {
        let Ok(account) = form().validate(false) else {
            panic!("expected valid form");
        };
        assert_eq!(account.email, "dana@example.com");
        assert_eq!(account.password, None);
        assert_eq!(account.profile.company_name.as_deref(), Some("Reyes Freight"));
        assert_eq!(account.profile.phone, None);
    }

    #[test]
    fn test_admin_password_is_required() {
        let Err(ActionError::Validation(errors)) = form().validate(true) else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("password").map(String::as_str),
            Some("Password is required")
        );
    }

    #[test]
    fn test_short_password_is_rejected() {
        let form = AccountForm {
            password: "short".to_owned(),
            ..form()
        };
        assert!(matches!(form.validate(false), Err(ActionError::Validation(_))));
    }
}
