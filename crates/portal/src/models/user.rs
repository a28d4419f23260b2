//! User accounts (admins and customers).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehub_core::{Email, Role, UserId, UserStatus};

/// Business details a customer provides at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub company_name: Option<String>,
    pub business_type: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A user account. The password hash is never part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub status: UserStatus,
    #[serde(flatten)]
    pub profile: BusinessProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may sign in.
    #[must_use]
    pub fn can_log_in(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// A user together with their stored password hash, for login checks.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    /// `None` for externally provisioned accounts without a password.
    pub password_hash: Option<String>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub profile: BusinessProfile,
}

/// Filter for client listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct UserFilter {
    /// Matches name, email or company name.
    pub search: Option<String>,
    pub status: Option<UserStatus>,
    pub role: Option<Role>,
}

/// Client counts shown above the client table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub total: u64,
    pub by_status: BTreeMap<UserStatus, u64>,
}
