//! Persistence for the portal.
//!
//! # Tables
//!
//! - `users` - Admins and customers, with business profile
//! - `warehouses` - Warehouse sites
//! - `spaces` - Rentable spaces, each in one warehouse
//! - `agreements` - Leases linking a customer to a space
//! - `invoices` - Invoices per client and space
//! - `support_tickets` - Customer support tickets
//! - `space_requests` - Public requests to rent a space
//!
//! # Backends
//!
//! Every entity has a repository trait. [`postgres::PgDatabase`] implements
//! them over `PostgreSQL`; [`memory::MemoryDatabase`] keeps everything in
//! process for tests and the `PORTAL_STORE=memory` demo mode.
//!
//! Rules that span rows (a space is `OCCUPIED` exactly while it holds a
//! non-inactive agreement, a pending space request holds its space as
//! `RESERVED`) are enforced inside single repository calls so each runs as
//! one transaction.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/portal/migrations/` and run via:
//! ```bash
//! cargo run -p warehub-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use warehub_core::{
    AgreementId, Email, InvoiceId, InvoiceStatus, Page, PageRequest, Role, SpaceId,
    SpaceRequestId, SpaceStatus, TicketId, UserId, UserStatus, WarehouseId,
};

use crate::models::{
    Agreement, AgreementChanges, AgreementDetail, AgreementDraft, AgreementFilter,
    AgreementStats, BusinessProfile, BusinessTypeCount, ClientStats, DashboardOverview, Invoice,
    InvoiceDetail, InvoiceFilter, InvoiceStats, MonthlyRevenue, NewInvoice, NewSpaceRequest,
    NewTicket, NewUser, Space, SpaceDetail, SpaceDraft, SpaceFilter, SpaceRequest,
    SpaceRequestDetail, SpaceRequestFilter, SpaceStats, SupportTicket, TicketChanges,
    TicketDetail, TicketFilter, TicketStats, User, UserCredentials, UserFilter, Warehouse,
    WarehouseDraft, WarehouseFilter, WarehouseOccupancy, WarehouseStats, WarehouseSummary,
};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation. Carries the name of the conflicting field.
    #[error("{0} is already in use")]
    Conflict(String),

    /// The operation is not allowed in the entity's current state.
    #[error("{0}")]
    InvalidState(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// User accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with `Conflict("email")` on a duplicate email.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Look up a user and their password hash for login.
    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, RepositoryError>;

    /// Counts by status over users with `role`.
    async fn stats(&self, role: Role) -> Result<ClientStats, RepositoryError>;

    async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        profile: &BusinessProfile,
    ) -> Result<User, RepositoryError>;

    async fn set_status(&self, id: UserId, status: UserStatus) -> Result<User, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    /// Delete a user. Refused while they have agreements, invoices or tickets.
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
}

/// Warehouse sites.
#[async_trait]
pub trait WarehouseRepository: Send + Sync {
    /// Insert a warehouse. Fails with `Conflict("code")` on a duplicate code.
    async fn create(&self, draft: WarehouseDraft) -> Result<Warehouse, RepositoryError>;

    async fn get(&self, id: WarehouseId) -> Result<Option<WarehouseSummary>, RepositoryError>;

    async fn list(
        &self,
        filter: &WarehouseFilter,
        page: PageRequest,
    ) -> Result<Page<WarehouseSummary>, RepositoryError>;

    async fn stats(&self) -> Result<WarehouseStats, RepositoryError>;

    async fn update(
        &self,
        id: WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<Warehouse, RepositoryError>;

    /// Delete a warehouse and its spaces in one transaction.
    ///
    /// Refused with `InvalidState` while any space is occupied or reserved.
    async fn delete(&self, id: WarehouseId) -> Result<(), RepositoryError>;
}

/// Spaces inside warehouses.
#[async_trait]
pub trait SpaceRepository: Send + Sync {
    /// Insert a space. Fails with `Conflict("code")` on a duplicate code and
    /// `NotFound` when the warehouse does not exist.
    async fn create(&self, draft: SpaceDraft) -> Result<Space, RepositoryError>;

    async fn get(&self, id: SpaceId) -> Result<Option<SpaceDetail>, RepositoryError>;

    async fn list(
        &self,
        filter: &SpaceFilter,
        page: PageRequest,
    ) -> Result<Page<SpaceDetail>, RepositoryError>;

    async fn stats(&self, filter: &SpaceFilter) -> Result<SpaceStats, RepositoryError>;

    /// Replace a space's fields.
    ///
    /// Refused with `InvalidState` when the change would set `OCCUPIED` by
    /// hand or move an occupied space to another status.
    async fn update(&self, id: SpaceId, draft: SpaceDraft) -> Result<Space, RepositoryError>;

    /// Delete a space. Refused while any agreement references it.
    async fn delete(&self, id: SpaceId) -> Result<(), RepositoryError>;

    /// Spaces currently held by a non-inactive agreement of `client`.
    async fn list_for_client(&self, client: UserId) -> Result<Vec<SpaceDetail>, RepositoryError>;
}

/// Lease agreements.
#[async_trait]
pub trait AgreementRepository: Send + Sync {
    /// Insert an agreement and mark its space `OCCUPIED` in one transaction.
    ///
    /// Refused with `InvalidState` unless the space is `AVAILABLE`.
    async fn create(&self, draft: AgreementDraft) -> Result<Agreement, RepositoryError>;

    async fn get(&self, id: AgreementId) -> Result<Option<AgreementDetail>, RepositoryError>;

    async fn list(
        &self,
        filter: &AgreementFilter,
        page: PageRequest,
    ) -> Result<Page<AgreementDetail>, RepositoryError>;

    async fn stats(&self, filter: &AgreementFilter) -> Result<AgreementStats, RepositoryError>;

    /// Apply changes, moving the space between `AVAILABLE` and `OCCUPIED`
    /// when the status crosses the inactive boundary.
    async fn update(
        &self,
        id: AgreementId,
        changes: AgreementChanges,
    ) -> Result<Agreement, RepositoryError>;

    /// Delete an agreement, releasing its space if it held it.
    async fn delete(&self, id: AgreementId) -> Result<(), RepositoryError>;

    /// Whether `client` has ever held an agreement on `space`.
    async fn client_has_agreement(
        &self,
        client: UserId,
        space: SpaceId,
    ) -> Result<bool, RepositoryError>;
}

/// Invoices.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert an invoice. Fails with `Conflict("number")` on a duplicate number.
    async fn create(&self, invoice: NewInvoice) -> Result<Invoice, RepositoryError>;

    async fn get(&self, id: InvoiceId) -> Result<Option<InvoiceDetail>, RepositoryError>;

    async fn list(
        &self,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> Result<Page<InvoiceDetail>, RepositoryError>;

    async fn stats(&self, filter: &InvoiceFilter) -> Result<InvoiceStats, RepositoryError>;

    /// Set the status, stamping `paid_at` on `PAID` and clearing it otherwise.
    async fn set_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, RepositoryError>;

    async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError>;
}

/// Support tickets.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn create(&self, ticket: NewTicket) -> Result<SupportTicket, RepositoryError>;

    async fn get(&self, id: TicketId) -> Result<Option<TicketDetail>, RepositoryError>;

    async fn list(
        &self,
        filter: &TicketFilter,
        page: PageRequest,
    ) -> Result<Page<TicketDetail>, RepositoryError>;

    async fn stats(&self, filter: &TicketFilter) -> Result<TicketStats, RepositoryError>;

    async fn update(
        &self,
        id: TicketId,
        changes: TicketChanges,
    ) -> Result<SupportTicket, RepositoryError>;

    /// Mark a ticket resolved.
    ///
    /// An already resolved ticket is returned unchanged. A closed ticket is
    /// refused with `InvalidState`.
    async fn resolve(
        &self,
        id: TicketId,
        resolution: Option<String>,
    ) -> Result<SupportTicket, RepositoryError>;

    async fn delete(&self, id: TicketId) -> Result<(), RepositoryError>;
}

/// Public space requests.
#[async_trait]
pub trait SpaceRequestRepository: Send + Sync {
    /// Record a pending request and reserve the space in one transaction.
    ///
    /// Refused with `InvalidState` unless the space is `AVAILABLE`.
    async fn submit(&self, request: NewSpaceRequest) -> Result<SpaceRequest, RepositoryError>;

    /// Remove a pending request and release its space. Used when the
    /// notification could not be delivered.
    async fn withdraw(&self, id: SpaceRequestId) -> Result<(), RepositoryError>;

    async fn get(&self, id: SpaceRequestId)
    -> Result<Option<SpaceRequestDetail>, RepositoryError>;

    async fn list(
        &self,
        filter: &SpaceRequestFilter,
        page: PageRequest,
    ) -> Result<Page<SpaceRequestDetail>, RepositoryError>;

    /// Approve a pending request: the reserved space becomes `OCCUPIED`
    /// under a new agreement, all in one transaction.
    async fn approve(
        &self,
        id: SpaceRequestId,
        draft: AgreementDraft,
    ) -> Result<(SpaceRequest, Agreement), RepositoryError>;

    /// Reject a pending request and release its space.
    async fn reject(&self, id: SpaceRequestId) -> Result<SpaceRequest, RepositoryError>;
}

/// Read-only aggregates.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Paid revenue per month over the last `months` months, oldest first.
    async fn revenue_by_month(&self, months: u32) -> Result<Vec<MonthlyRevenue>, RepositoryError>;

    async fn occupancy(&self) -> Result<Vec<WarehouseOccupancy>, RepositoryError>;

    async fn clients_by_business_type(&self) -> Result<Vec<BusinessTypeCount>, RepositoryError>;

    async fn overview(&self) -> Result<DashboardOverview, RepositoryError>;
}

/// A storage backend exposing every repository.
#[async_trait]
pub trait Database: Send + Sync {
    fn users(&self) -> &dyn UserRepository;
    fn warehouses(&self) -> &dyn WarehouseRepository;
    fn spaces(&self) -> &dyn SpaceRepository;
    fn agreements(&self) -> &dyn AgreementRepository;
    fn invoices(&self) -> &dyn InvoiceRepository;
    fn tickets(&self) -> &dyn TicketRepository;
    fn space_requests(&self) -> &dyn SpaceRequestRepository;
    fn analytics(&self) -> &dyn AnalyticsRepository;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Convert a database count into an unsigned total.
pub(crate) fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}

/// Admins may not set `OCCUPIED` by hand nor move an occupied space.
pub(crate) fn check_manual_status_change(
    current: SpaceStatus,
    requested: SpaceStatus,
) -> Result<(), RepositoryError> {
    if current == requested {
        return Ok(());
    }
    if current == SpaceStatus::Occupied {
        return Err(RepositoryError::InvalidState(
            "An occupied space changes status through its agreement".to_owned(),
        ));
    }
    if !requested.is_manually_assignable() {
        return Err(RepositoryError::InvalidState(
            "A space becomes occupied only through an agreement".to_owned(),
        ));
    }
    Ok(())
}
