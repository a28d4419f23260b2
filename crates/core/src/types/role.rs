//! User roles and the capabilities they grant.
//!
//! Route-level checks live in the portal's access gate; actions check
//! capabilities through [`Role::can`] so both layers share one table.

use serde::{Deserialize, Serialize};

use super::status::ParseEnumError;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Back-office staff managing inventory, leases and billing.
    Admin,
    /// A tenant renting space.
    Customer,
}

/// Something a role is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create, edit and delete warehouses and spaces.
    ManageInventory,
    /// Create, edit and delete lease agreements.
    ManageAgreements,
    /// Manage customer accounts.
    ManageClients,
    /// Create admin accounts.
    ManageStaff,
    /// Issue and update invoices.
    ManageInvoices,
    /// Triage, resolve and delete any support ticket.
    ManageSupport,
    /// Approve or reject public space requests.
    ReviewSpaceRequests,
    /// Read revenue, occupancy and client analytics.
    ViewAnalytics,
    /// See own spaces, agreements and invoices.
    ViewOwnLeases,
    /// Open support tickets and delete own tickets.
    SubmitTickets,
    /// Edit own profile and password.
    EditOwnProfile,
}

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::ManageInventory,
    Capability::ManageAgreements,
    Capability::ManageClients,
    Capability::ManageStaff,
    Capability::ManageInvoices,
    Capability::ManageSupport,
    Capability::ReviewSpaceRequests,
    Capability::ViewAnalytics,
    Capability::EditOwnProfile,
];

const CUSTOMER_CAPABILITIES: &[Capability] = &[
    Capability::ViewOwnLeases,
    Capability::SubmitTickets,
    Capability::EditOwnProfile,
];

impl Role {
    /// The capabilities granted to this role.
    #[must_use]
    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Admin => ADMIN_CAPABILITIES,
            Self::Customer => CUSTOMER_CAPABILITIES,
        }
    }

    /// Whether this role grants `capability`.
    #[must_use]
    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// The wire and database spelling of this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Customer => "CUSTOMER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "CUSTOMER" => Ok(Self::Customer),
            _ => Err(ParseEnumError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}
