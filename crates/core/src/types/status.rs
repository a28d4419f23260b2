//! Status and classification enums for Warehub entities.
//!
//! Every enum here is stored as a `PostgreSQL` enum type and travels over the
//! wire in `SCREAMING_SNAKE_CASE`, the same spelling the forms submit.

use thiserror::Error;

/// Error returned when a submitted value is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// The enum being parsed (e.g. "space status").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Define a string-backed enum with `Display`, `FromStr` and an optional
/// `sqlx::Type` mapping to a `PostgreSQL` enum.
///
/// Parsing ignores case and surrounding whitespace so form values such as
/// `"available"` and `"AVAILABLE"` are both accepted.
macro_rules! define_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:tt, pg = $pg:tt) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:tt ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type))]
        #[cfg_attr(
            feature = "postgres",
            sqlx(type_name = $pg, rename_all = "SCREAMING_SNAKE_CASE")
        )]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire and database spelling of this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

define_enum! {
    /// Lifecycle of a user account. Only `Active` users may log in.
    UserStatus ("user status", pg = "user_status") {
        Active => "ACTIVE",
        /// Registered but awaiting admin approval.
        Pending => "PENDING",
        Inactive => "INACTIVE",
    }
}

define_enum! {
    /// Kind of storage a warehouse offers.
    StorageType ("storage type", pg = "storage_type") {
        Ambient => "AMBIENT",
        ClimateControlled => "CLIMATE_CONTROLLED",
        ColdStorage => "COLD_STORAGE",
        Hazmat => "HAZMAT",
        Bonded => "BONDED",
        Outdoor => "OUTDOOR",
    }
}

define_enum! {
    /// Rentability of a space.
    SpaceStatus ("space status", pg = "space_status") {
        Available => "AVAILABLE",
        /// Held by exactly one non-inactive agreement.
        Occupied => "OCCUPIED",
        Maintenance => "MAINTENANCE",
        /// Held by a pending space request or set aside by an admin.
        Reserved => "RESERVED",
    }
}

impl SpaceStatus {
    /// Statuses an admin may assign directly. `Occupied` is only ever set
    /// by the agreement workflow.
    #[must_use]
    pub const fn is_manually_assignable(self) -> bool {
        !matches!(self, Self::Occupied)
    }
}

define_enum! {
    /// Lease agreement status.
    AgreementStatus ("agreement status", pg = "agreement_status") {
        Pending => "PENDING",
        Active => "ACTIVE",
        Inactive => "INACTIVE",
    }
}

impl AgreementStatus {
    /// Whether an agreement in this status holds its space.
    #[must_use]
    pub const fn holds_space(self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

define_enum! {
    /// Invoice payment status.
    InvoiceStatus ("invoice status", pg = "invoice_status") {
        Pending => "PENDING",
        Paid => "PAID",
        Overdue => "OVERDUE",
    }
}

define_enum! {
    /// Support ticket workflow status.
    TicketStatus ("ticket status", pg = "ticket_status") {
        Open => "OPEN",
        InProgress => "IN_PROGRESS",
        Resolved => "RESOLVED",
        Closed => "CLOSED",
    }
}

define_enum! {
    /// Support ticket urgency.
    TicketPriority ("ticket priority", pg = "ticket_priority") {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Urgent => "URGENT",
    }
}

define_enum! {
    /// Support ticket topic.
    TicketCategory ("ticket category", pg = "ticket_category") {
        Billing => "BILLING",
        Maintenance => "MAINTENANCE",
        Access => "ACCESS",
        General => "GENERAL",
    }
}

define_enum! {
    /// Outcome of a public request to rent a space.
    SpaceRequestStatus ("space request status", pg = "space_request_status") {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("available".parse::<SpaceStatus>().unwrap(), SpaceStatus::Available);
        assert_eq!(" In Progress ".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
        assert_eq!(
            "climate-controlled".parse::<StorageType>().unwrap(),
            StorageType::ClimateControlled
        );
    }

    #[test]
    fn test_parse_error_names_the_enum() {
        let err = "LEASED".parse::<SpaceStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid space status: LEASED");
    }

    #[test]
    fn test_display_matches_serde() {
        for status in TicketStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn test_occupied_is_not_manually_assignable() {
        assert!(!SpaceStatus::Occupied.is_manually_assignable());
        assert!(SpaceStatus::Maintenance.is_manually_assignable());
    }

    #[test]
    fn test_inactive_agreement_releases_space() {
        assert!(AgreementStatus::Active.holds_space());
        assert!(AgreementStatus::Pending.holds_space());
        assert!(!AgreementStatus::Inactive.holds_space());
    }
}
