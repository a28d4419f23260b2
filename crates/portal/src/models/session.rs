//! The authenticated identity attached to a request.

use serde::{Deserialize, Serialize};

use warehub_core::{Role, UserId};

/// The authenticated caller of an action.
///
/// Decoded from the session token by the access gate and passed explicitly
/// to every action that needs an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    /// User's database ID.
    pub id: UserId,
    /// User's role.
    pub role: Role,
    /// User's display name.
    pub name: String,
    /// User's email address.
    pub email: String,
}

impl Caller {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
