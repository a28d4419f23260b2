//! Domain models for the portal.
//!
//! Models are validated domain objects. Repositories convert database rows
//! into these types; actions build the `*Draft` and `New*` inputs from forms.

pub mod agreement;
pub mod analytics;
pub mod invoice;
pub mod session;
pub mod space;
pub mod space_request;
pub mod ticket;
pub mod user;
pub mod warehouse;

pub use agreement::{Agreement, AgreementChanges, AgreementDetail, AgreementDraft, AgreementFilter, AgreementStats};
pub use analytics::{BusinessTypeCount, DashboardOverview, MonthlyRevenue, WarehouseOccupancy};
pub use invoice::{Invoice, InvoiceDetail, InvoiceFilter, InvoiceStats, NewInvoice};
pub use session::Caller;
pub use space::{Space, SpaceDetail, SpaceDraft, SpaceFilter, SpaceStats};
pub use space_request::{NewSpaceRequest, SpaceRequest, SpaceRequestDetail, SpaceRequestFilter};
pub use ticket::{NewTicket, SupportTicket, TicketChanges, TicketDetail, TicketFilter, TicketStats};
pub use user::{BusinessProfile, ClientStats, NewUser, User, UserCredentials, UserFilter};
pub use warehouse::{Warehouse, WarehouseDraft, WarehouseFilter, WarehouseStats, WarehouseSummary};

/// Case-insensitive substring match used by in-memory search filters.
pub(crate) fn matches_search(term: Option<&str>, fields: &[&str]) -> bool {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return true;
    };
    let needle = term.to_lowercase();
    fields.iter().any(|f| f.to_lowercase().contains(&needle))
}
