//! In-process storage backend.
//!
//! Holds every table behind one `tokio::sync::RwLock`. Each repository call
//! takes the lock once, so multi-row rules are applied atomically just like
//! the `PostgreSQL` transactions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, Months, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use warehub_core::{
    AgreementId, AgreementStatus, Email, InvoiceId, InvoiceStatus, Page, PageRequest, Role,
    SpaceId, SpaceRequestId, SpaceRequestStatus, SpaceStatus, TicketId, TicketStatus, UserId,
    UserStatus, WarehouseId,
};

use super::{
    AgreementRepository, AnalyticsRepository, Database, InvoiceRepository, RepositoryError,
    SpaceRepository, SpaceRequestRepository, TicketRepository, UserRepository,
    WarehouseRepository, check_manual_status_change,
};
use crate::models::{
    Agreement, AgreementChanges, AgreementDetail, AgreementDraft, AgreementFilter,
    AgreementStats, BusinessProfile, BusinessTypeCount, ClientStats, DashboardOverview, Invoice,
    InvoiceDetail, InvoiceFilter, InvoiceStats, MonthlyRevenue, NewInvoice, NewSpaceRequest,
    NewTicket, NewUser, Space, SpaceDetail, SpaceDraft, SpaceFilter, SpaceRequest,
    SpaceRequestDetail, SpaceRequestFilter, SpaceStats, SupportTicket, TicketChanges,
    TicketDetail, TicketFilter, TicketStats, User, UserCredentials, UserFilter, Warehouse,
    WarehouseDraft, WarehouseFilter, WarehouseOccupancy, WarehouseStats, WarehouseSummary,
    matches_search,
};

const SPACE_NOT_AVAILABLE: &str = "Space is not available";

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    sequence: i32,
    users: BTreeMap<UserId, StoredUser>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    spaces: BTreeMap<SpaceId, Space>,
    agreements: BTreeMap<AgreementId, Agreement>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    tickets: BTreeMap<TicketId, SupportTicket>,
    space_requests: BTreeMap<SpaceRequestId, SpaceRequest>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.sequence += 1;
        self.sequence
    }

    fn user(&self, id: UserId) -> Result<&User, RepositoryError> {
        self.users
            .get(&id)
            .map(|stored| &stored.user)
            .ok_or_else(|| RepositoryError::DataCorruption(format!("missing user {id}")))
    }

    fn warehouse(&self, id: WarehouseId) -> Result<&Warehouse, RepositoryError> {
        self.warehouses
            .get(&id)
            .ok_or_else(|| RepositoryError::DataCorruption(format!("missing warehouse {id}")))
    }

    fn space(&self, id: SpaceId) -> Result<&Space, RepositoryError> {
        self.spaces
            .get(&id)
            .ok_or_else(|| RepositoryError::DataCorruption(format!("missing space {id}")))
    }

    fn space_mut(&mut self, id: SpaceId) -> Result<&mut Space, RepositoryError> {
        self.spaces.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn warehouse_summary(&self, warehouse: &Warehouse) -> Result<WarehouseSummary, RepositoryError> {
        let manager = self.user(warehouse.manager_id)?;
        let spaces = self.spaces.values().filter(|s| s.warehouse_id == warehouse.id);
        let (space_count, occupied_count) = spaces.fold((0, 0), |(total, occupied), s| {
            (total + 1, occupied + u64::from(s.status == SpaceStatus::Occupied))
        });
        Ok(WarehouseSummary {
            warehouse: warehouse.clone(),
            manager_name: manager.name.clone(),
            space_count,
            occupied_count,
        })
    }

    fn space_detail(&self, space: &Space) -> Result<SpaceDetail, RepositoryError> {
        let warehouse = self.warehouse(space.warehouse_id)?;
        Ok(SpaceDetail {
            space: space.clone(),
            warehouse_name: warehouse.name.clone(),
            warehouse_location: warehouse.location.clone(),
        })
    }

    fn agreement_detail(&self, agreement: &Agreement) -> Result<AgreementDetail, RepositoryError> {
        let client = self.user(agreement.client_id)?;
        let space = self.space(agreement.space_id)?;
        let warehouse = self.warehouse(space.warehouse_id)?;
        Ok(AgreementDetail {
            agreement: agreement.clone(),
            client_name: client.name.clone(),
            space_code: space.code.clone(),
            space_name: space.name.clone(),
            warehouse_name: warehouse.name.clone(),
        })
    }

    fn invoice_detail(&self, invoice: &Invoice) -> Result<InvoiceDetail, RepositoryError> {
        Ok(InvoiceDetail {
            invoice: invoice.clone(),
            client_name: self.user(invoice.client_id)?.name.clone(),
            space_code: self.space(invoice.space_id)?.code.clone(),
        })
    }

    fn ticket_detail(&self, ticket: &SupportTicket) -> Result<TicketDetail, RepositoryError> {
        let space_code = ticket
            .space_id
            .and_then(|id| self.spaces.get(&id))
            .map(|s| s.code.clone());
        Ok(TicketDetail {
            ticket: ticket.clone(),
            client_name: self.user(ticket.client_id)?.name.clone(),
            space_code,
        })
    }

    fn space_request_detail(
        &self,
        request: &SpaceRequest,
    ) -> Result<SpaceRequestDetail, RepositoryError> {
        let space = self.space(request.space_id)?;
        Ok(SpaceRequestDetail {
            request: request.clone(),
            space_code: space.code.clone(),
            space_name: space.name.clone(),
            warehouse_name: self.warehouse(space.warehouse_id)?.name.clone(),
        })
    }

    /// Insert an agreement and occupy its space. The caller has already
    /// checked the space is free for it.
    fn insert_agreement(&mut self, draft: AgreementDraft) -> Result<Agreement, RepositoryError> {
        let now = Utc::now();
        let agreement = Agreement {
            id: AgreementId::new(self.next_id()),
            client_id: draft.client_id,
            space_id: draft.space_id,
            monthly_rent: draft.monthly_rent,
            deposit: draft.deposit,
            start_date: draft.start_date,
            end_date: draft.end_date,
            terms: draft.terms,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        if agreement.status.holds_space() {
            let space = self.space_mut(agreement.space_id)?;
            space.status = SpaceStatus::Occupied;
            space.updated_at = now;
        }
        self.agreements.insert(agreement.id, agreement.clone());
        Ok(agreement)
    }

    fn space_has_history(&self, space: SpaceId) -> bool {
        self.agreements.values().any(|a| a.space_id == space)
            || self.invoices.values().any(|i| i.space_id == space)
    }
}

/// Storage backend that keeps all data in memory.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first, matching the `ORDER BY created_at DESC` of the SQL backend.
fn newest_first<K: Ord, V>(map: &BTreeMap<K, V>) -> impl Iterator<Item = &V> {
    map.values().rev()
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn create(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.user.email == new.email) {
            return Err(RepositoryError::Conflict("email".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(t.next_id()),
            name: new.name,
            email: new.email,
            role: new.role,
            status: new.status,
            profile: new.profile,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(user)
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let t = self.tables.read().await;
        Ok(t.users.get(&id).map(|s| s.user.clone()))
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .find(|s| &s.user.email == email)
            .map(|s| UserCredentials {
                user: s.user.clone(),
                password_hash: s.password_hash.clone(),
            }))
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let t = self.tables.read().await;
        t.users
            .get(&id)
            .map(|s| s.password_hash.clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, RepositoryError> {
        let t = self.tables.read().await;
        let users = newest_first(&t.users)
            .map(|s| &s.user)
            .filter(|u| filter.role.is_none_or(|r| u.role == r))
            .filter(|u| filter.status.is_none_or(|s| u.status == s))
            .filter(|u| {
                matches_search(
                    filter.search.as_deref(),
                    &[
                        &u.name,
                        u.email.as_str(),
                        u.profile.company_name.as_deref().unwrap_or_default(),
                    ],
                )
            })
            .cloned()
            .collect();
        Ok(Page::from_vec(users, page))
    }

    async fn stats(&self, role: Role) -> Result<ClientStats, RepositoryError> {
        let t = self.tables.read().await;
        let mut stats = ClientStats::default();
        for stored in t.users.values().filter(|s| s.user.role == role) {
            stats.total += 1;
            *stats.by_status.entry(stored.user.status).or_default() += 1;
        }
        Ok(stats)
    }

    async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        profile: &BusinessProfile,
    ) -> Result<User, RepositoryError> {
        let mut t = self.tables.write().await;
        let stored = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        name.clone_into(&mut stored.user.name);
        stored.user.profile = profile.clone();
        stored.user.updated_at = Utc::now();
        Ok(stored.user.clone())
    }

    async fn set_status(&self, id: UserId, status: UserStatus) -> Result<User, RepositoryError> {
        let mut t = self.tables.write().await;
        let stored = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.user.status = status;
        stored.user.updated_at = Utc::now();
        Ok(stored.user.clone())
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        let stored = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.password_hash = Some(hash.to_owned());
        stored.user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        let referenced = t.agreements.values().any(|a| a.client_id == id)
            || t.invoices.values().any(|i| i.client_id == id)
            || t.tickets.values().any(|k| k.client_id == id)
            || t.warehouses.values().any(|w| w.manager_id == id);
        if referenced {
            return Err(RepositoryError::InvalidState(
                "User has agreements, invoices, tickets or warehouses".to_owned(),
            ));
        }
        t.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl WarehouseRepository for MemoryDatabase {
    async fn create(&self, draft: WarehouseDraft) -> Result<Warehouse, RepositoryError> {
        let mut t = self.tables.write().await;
        if t.warehouses.values().any(|w| w.code == draft.code) {
            return Err(RepositoryError::Conflict("code".to_owned()));
        }
        if !t.users.contains_key(&draft.manager_id) {
            return Err(RepositoryError::NotFound);
        }
        let now = Utc::now();
        let warehouse = Warehouse {
            id: WarehouseId::new(t.next_id()),
            code: draft.code,
            name: draft.name,
            location: draft.location,
            storage_type: draft.storage_type,
            capacity: draft.capacity,
            manager_id: draft.manager_id,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };
        t.warehouses.insert(warehouse.id, warehouse.clone());
        Ok(warehouse)
    }

    async fn get(&self, id: WarehouseId) -> Result<Option<WarehouseSummary>, RepositoryError> {
        let t = self.tables.read().await;
        t.warehouses
            .get(&id)
            .map(|w| t.warehouse_summary(w))
            .transpose()
    }

    async fn list(
        &self,
        filter: &WarehouseFilter,
        page: PageRequest,
    ) -> Result<Page<WarehouseSummary>, RepositoryError> {
        let t = self.tables.read().await;
        let rows = newest_first(&t.warehouses)
            .filter(|w| filter.storage_type.is_none_or(|s| w.storage_type == s))
            .filter(|w| {
                matches_search(filter.search.as_deref(), &[&w.code, &w.name, &w.location])
            })
            .map(|w| t.warehouse_summary(w))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_vec(rows, page))
    }

    async fn stats(&self) -> Result<WarehouseStats, RepositoryError> {
        let t = self.tables.read().await;
        let mut stats = WarehouseStats {
            total: t.warehouses.len() as u64,
            total_capacity: t.warehouses.values().map(|w| i64::from(w.capacity)).sum(),
            ..WarehouseStats::default()
        };
        for space in t.spaces.values() {
            *stats.spaces_by_status.entry(space.status).or_default() += 1;
        }
        Ok(stats)
    }

    async fn update(
        &self,
        id: WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<Warehouse, RepositoryError> {
        let mut t = self.tables.write().await;
        if t.warehouses.values().any(|w| w.code == draft.code && w.id != id) {
            return Err(RepositoryError::Conflict("code".to_owned()));
        }
        let warehouse = t.warehouses.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        warehouse.code = draft.code;
        warehouse.name = draft.name;
        warehouse.location = draft.location;
        warehouse.storage_type = draft.storage_type;
        warehouse.capacity = draft.capacity;
        warehouse.manager_id = draft.manager_id;
        warehouse.description = draft.description;
        warehouse.updated_at = Utc::now();
        Ok(warehouse.clone())
    }

    async fn delete(&self, id: WarehouseId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        if !t.warehouses.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        let space_ids: Vec<SpaceId> = t
            .spaces
            .values()
            .filter(|s| s.warehouse_id == id)
            .map(|s| s.id)
            .collect();
        let held = space_ids.iter().any(|sid| {
            t.spaces
                .get(sid)
                .is_some_and(|s| matches!(s.status, SpaceStatus::Occupied | SpaceStatus::Reserved))
        });
        if held {
            return Err(RepositoryError::InvalidState(
                "Cannot delete a warehouse with occupied or reserved spaces".to_owned(),
            ));
        }
        if space_ids.iter().any(|sid| t.space_has_history(*sid)) {
            return Err(RepositoryError::InvalidState(
                "Cannot delete a warehouse whose spaces have agreements or invoices".to_owned(),
            ));
        }
        for sid in &space_ids {
            t.spaces.remove(sid);
        }
        t.space_requests.retain(|_, r| !space_ids.contains(&r.space_id));
        for ticket in t.tickets.values_mut() {
            if ticket.space_id.is_some_and(|sid| space_ids.contains(&sid)) {
                ticket.space_id = None;
            }
        }
        t.warehouses.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SpaceRepository for MemoryDatabase {
    async fn create(&self, draft: SpaceDraft) -> Result<Space, RepositoryError> {
        let mut t = self.tables.write().await;
        if !t.warehouses.contains_key(&draft.warehouse_id) {
            return Err(RepositoryError::NotFound);
        }
        if t.spaces.values().any(|s| s.code == draft.code) {
            return Err(RepositoryError::Conflict("code".to_owned()));
        }
        let now = Utc::now();
        let space = Space {
            id: SpaceId::new(t.next_id()),
            warehouse_id: draft.warehouse_id,
            code: draft.code,
            name: draft.name,
            space_type: draft.space_type,
            size: draft.size,
            rate: draft.rate,
            status: draft.status.unwrap_or(SpaceStatus::Available),
            created_at: now,
            updated_at: now,
        };
        t.spaces.insert(space.id, space.clone());
        Ok(space)
    }

    async fn get(&self, id: SpaceId) -> Result<Option<SpaceDetail>, RepositoryError> {
        let t = self.tables.read().await;
        t.spaces.get(&id).map(|s| t.space_detail(s)).transpose()
    }

    async fn list(
        &self,
        filter: &SpaceFilter,
        page: PageRequest,
    ) -> Result<Page<SpaceDetail>, RepositoryError> {
        let t = self.tables.read().await;
        let rows = newest_first(&t.spaces)
            .filter(|s| space_matches(s, filter))
            .map(|s| t.space_detail(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_vec(rows, page))
    }

    async fn stats(&self, filter: &SpaceFilter) -> Result<SpaceStats, RepositoryError> {
        let t = self.tables.read().await;
        let mut stats = SpaceStats::default();
        for space in t.spaces.values().filter(|s| space_matches(s, filter)) {
            stats.total += 1;
            *stats.by_status.entry(space.status).or_default() += 1;
        }
        Ok(stats)
    }

    async fn update(&self, id: SpaceId, draft: SpaceDraft) -> Result<Space, RepositoryError> {
        let mut t = self.tables.write().await;
        if !t.warehouses.contains_key(&draft.warehouse_id) {
            return Err(RepositoryError::NotFound);
        }
        if t.spaces.values().any(|s| s.code == draft.code && s.id != id) {
            return Err(RepositoryError::Conflict("code".to_owned()));
        }
        let space = t.space_mut(id)?;
        let status = draft.status.unwrap_or(space.status);
        check_manual_status_change(space.status, status)?;
        space.warehouse_id = draft.warehouse_id;
        space.code = draft.code;
        space.name = draft.name;
        space.space_type = draft.space_type;
        space.size = draft.size;
        space.rate = draft.rate;
        space.status = status;
        space.updated_at = Utc::now();
        Ok(space.clone())
    }

    async fn delete(&self, id: SpaceId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        if !t.spaces.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if t.space_has_history(id) {
            return Err(RepositoryError::InvalidState(
                "Cannot delete a space with agreements or invoices".to_owned(),
            ));
        }
        t.spaces.remove(&id);
        t.space_requests.retain(|_, r| r.space_id != id);
        for ticket in t.tickets.values_mut() {
            if ticket.space_id == Some(id) {
                ticket.space_id = None;
            }
        }
        Ok(())
    }

    async fn list_for_client(&self, client: UserId) -> Result<Vec<SpaceDetail>, RepositoryError> {
        let t = self.tables.read().await;
        newest_first(&t.agreements)
            .filter(|a| a.client_id == client && a.status.holds_space())
            .map(|a| t.space(a.space_id).and_then(|s| t.space_detail(s)))
            .collect()
    }
}

fn space_matches(space: &Space, filter: &SpaceFilter) -> bool {
    filter.status.is_none_or(|s| space.status == s)
        && filter.warehouse_id.is_none_or(|w| space.warehouse_id == w)
        && matches_search(
            filter.search.as_deref(),
            &[&space.code, &space.name, &space.space_type],
        )
}

#[async_trait]
impl AgreementRepository for MemoryDatabase {
    async fn create(&self, draft: AgreementDraft) -> Result<Agreement, RepositoryError> {
        let mut t = self.tables.write().await;
        let space = t.spaces.get(&draft.space_id).ok_or(RepositoryError::NotFound)?;
        if space.status != SpaceStatus::Available {
            return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
        }
        t.insert_agreement(draft)
    }

    async fn get(&self, id: AgreementId) -> Result<Option<AgreementDetail>, RepositoryError> {
        let t = self.tables.read().await;
        t.agreements
            .get(&id)
            .map(|a| t.agreement_detail(a))
            .transpose()
    }

    async fn list(
        &self,
        filter: &AgreementFilter,
        page: PageRequest,
    ) -> Result<Page<AgreementDetail>, RepositoryError> {
        let t = self.tables.read().await;
        let rows = newest_first(&t.agreements)
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| filter.client_id.is_none_or(|c| a.client_id == c))
            .map(|a| t.agreement_detail(a))
            .filter(|d| {
                d.as_ref().map_or(true, |d| {
                    matches_search(
                        filter.search.as_deref(),
                        &[&d.client_name, &d.space_code, &d.space_name],
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_vec(rows, page))
    }

    async fn stats(&self, filter: &AgreementFilter) -> Result<AgreementStats, RepositoryError> {
        let t = self.tables.read().await;
        let mut stats = AgreementStats::default();
        let scoped = t
            .agreements
            .values()
            .filter(|a| filter.client_id.is_none_or(|c| a.client_id == c));
        for agreement in scoped {
            stats.total += 1;
            *stats.by_status.entry(agreement.status).or_default() += 1;
            if agreement.status == AgreementStatus::Active {
                stats.active_monthly_rent += agreement.monthly_rent;
            }
        }
        Ok(stats)
    }

    async fn update(
        &self,
        id: AgreementId,
        changes: AgreementChanges,
    ) -> Result<Agreement, RepositoryError> {
        let mut t = self.tables.write().await;
        let current = t.agreements.get(&id).ok_or(RepositoryError::NotFound)?.clone();
        let now = Utc::now();
        let was_holding = current.status.holds_space();
        let will_hold = changes.status.holds_space();

        if !was_holding && will_hold {
            let space = t.space_mut(current.space_id)?;
            if space.status != SpaceStatus::Available {
                return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
            }
            space.status = SpaceStatus::Occupied;
            space.updated_at = now;
        } else if was_holding && !will_hold {
            let space = t.space_mut(current.space_id)?;
            space.status = SpaceStatus::Available;
            space.updated_at = now;
        }

        let agreement = t.agreements.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        agreement.monthly_rent = changes.monthly_rent;
        agreement.deposit = changes.deposit;
        agreement.start_date = changes.start_date;
        agreement.end_date = changes.end_date;
        agreement.terms = changes.terms;
        agreement.status = changes.status;
        agreement.updated_at = now;
        Ok(agreement.clone())
    }

    async fn delete(&self, id: AgreementId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        let agreement = t.agreements.remove(&id).ok_or(RepositoryError::NotFound)?;
        if agreement.status.holds_space()
            && let Some(space) = t.spaces.get_mut(&agreement.space_id)
        {
            space.status = SpaceStatus::Available;
            space.updated_at = Utc::now();
        }
        for request in t.space_requests.values_mut() {
            if request.agreement_id == Some(id) {
                request.agreement_id = None;
            }
        }
        Ok(())
    }

    async fn client_has_agreement(
        &self,
        client: UserId,
        space: SpaceId,
    ) -> Result<bool, RepositoryError> {
        let t = self.tables.read().await;
        Ok(t.agreements
            .values()
            .any(|a| a.client_id == client && a.space_id == space))
    }
}

#[async_trait]
impl InvoiceRepository for MemoryDatabase {
    async fn create(&self, new: NewInvoice) -> Result<Invoice, RepositoryError> {
        let mut t = self.tables.write().await;
        if t.invoices.values().any(|i| i.number == new.number) {
            return Err(RepositoryError::Conflict("number".to_owned()));
        }
        let now = Utc::now();
        let invoice = Invoice {
            id: InvoiceId::new(t.next_id()),
            total_amount: new.total_amount(),
            number: new.number,
            client_id: new.client_id,
            space_id: new.space_id,
            amount: new.amount,
            tax: new.tax,
            status: new.status,
            issue_date: new.issue_date,
            due_date: new.due_date,
            paid_at: (new.status == InvoiceStatus::Paid).then_some(now),
            attachment_url: new.attachment_url,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        t.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn get(&self, id: InvoiceId) -> Result<Option<InvoiceDetail>, RepositoryError> {
        let t = self.tables.read().await;
        t.invoices.get(&id).map(|i| t.invoice_detail(i)).transpose()
    }

    async fn list(
        &self,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> Result<Page<InvoiceDetail>, RepositoryError> {
        let t = self.tables.read().await;
        let rows = newest_first(&t.invoices)
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .filter(|i| filter.client_id.is_none_or(|c| i.client_id == c))
            .map(|i| t.invoice_detail(i))
            .filter(|d| {
                d.as_ref().map_or(true, |d| {
                    matches_search(
                        filter.search.as_deref(),
                        &[&d.invoice.number, &d.client_name],
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_vec(rows, page))
    }

    async fn stats(&self, filter: &InvoiceFilter) -> Result<InvoiceStats, RepositoryError> {
        let t = self.tables.read().await;
        let mut stats = InvoiceStats::default();
        let scoped = t
            .invoices
            .values()
            .filter(|i| filter.client_id.is_none_or(|c| i.client_id == c));
        for invoice in scoped {
            stats.total += 1;
            *stats.by_status.entry(invoice.status).or_default() += 1;
            if invoice.status == InvoiceStatus::Paid {
                stats.paid_amount += invoice.total_amount;
            } else {
                stats.outstanding_amount += invoice.total_amount;
            }
        }
        Ok(stats)
    }

    async fn set_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, RepositoryError> {
        let mut t = self.tables.write().await;
        let invoice = t.invoices.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let now = Utc::now();
        invoice.paid_at = match status {
            InvoiceStatus::Paid => invoice.paid_at.or(Some(now)),
            InvoiceStatus::Pending | InvoiceStatus::Overdue => None,
        };
        invoice.status = status;
        invoice.updated_at = now;
        Ok(invoice.clone())
    }

    async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        t.invoices
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl TicketRepository for MemoryDatabase {
    async fn create(&self, new: NewTicket) -> Result<SupportTicket, RepositoryError> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let ticket = SupportTicket {
            id: TicketId::new(t.next_id()),
            client_id: new.client_id,
            space_id: new.space_id,
            subject: new.subject,
            message: new.message,
            category: new.category,
            priority: new.priority,
            status: TicketStatus::Open,
            attachment_url: new.attachment_url,
            resolution: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        t.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, id: TicketId) -> Result<Option<TicketDetail>, RepositoryError> {
        let t = self.tables.read().await;
        t.tickets.get(&id).map(|k| t.ticket_detail(k)).transpose()
    }

    async fn list(
        &self,
        filter: &TicketFilter,
        page: PageRequest,
    ) -> Result<Page<TicketDetail>, RepositoryError> {
        let t = self.tables.read().await;
        let rows = newest_first(&t.tickets)
            .filter(|k| ticket_matches(k, filter))
            .map(|k| t.ticket_detail(k))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_vec(rows, page))
    }

    async fn stats(&self, filter: &TicketFilter) -> Result<TicketStats, RepositoryError> {
        let t = self.tables.read().await;
        let mut stats = TicketStats::default();
        let scoped = t
            .tickets
            .values()
            .filter(|k| filter.client_id.is_none_or(|c| k.client_id == c));
        for ticket in scoped {
            stats.total += 1;
            *stats.by_status.entry(ticket.status).or_default() += 1;
            *stats.by_category.entry(ticket.category).or_default() += 1;
        }
        Ok(stats)
    }

    async fn update(
        &self,
        id: TicketId,
        changes: TicketChanges,
    ) -> Result<SupportTicket, RepositoryError> {
        let mut t = self.tables.write().await;
        let ticket = t.tickets.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let now = Utc::now();
        if let Some(status) = changes.status {
            if status == TicketStatus::Resolved && ticket.status != TicketStatus::Resolved {
                ticket.resolved_at = Some(now);
            } else if status != TicketStatus::Resolved && status != TicketStatus::Closed {
                ticket.resolved_at = None;
            }
            ticket.status = status;
        }
        if let Some(priority) = changes.priority {
            ticket.priority = priority;
        }
        ticket.updated_at = now;
        Ok(ticket.clone())
    }

    async fn resolve(
        &self,
        id: TicketId,
        resolution: Option<String>,
    ) -> Result<SupportTicket, RepositoryError> {
        let mut t = self.tables.write().await;
        let ticket = t.tickets.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        match ticket.status {
            TicketStatus::Resolved => Ok(ticket.clone()),
            TicketStatus::Closed => Err(RepositoryError::InvalidState(
                "A closed ticket cannot be resolved".to_owned(),
            )),
            TicketStatus::Open | TicketStatus::InProgress => {
                let now = Utc::now();
                ticket.status = TicketStatus::Resolved;
                ticket.resolution = resolution;
                ticket.resolved_at = Some(now);
                ticket.updated_at = now;
                Ok(ticket.clone())
            }
        }
    }

    async fn delete(&self, id: TicketId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        t.tickets
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

fn ticket_matches(ticket: &SupportTicket, filter: &TicketFilter) -> bool {
    filter.status.is_none_or(|s| ticket.status == s)
        && filter.category.is_none_or(|c| ticket.category == c)
        && filter.client_id.is_none_or(|c| ticket.client_id == c)
        && matches_search(filter.search.as_deref(), &[&ticket.subject, &ticket.message])
}

#[async_trait]
impl SpaceRequestRepository for MemoryDatabase {
    async fn submit(&self, new: NewSpaceRequest) -> Result<SpaceRequest, RepositoryError> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let space = t.space_mut(new.space_id)?;
        if space.status != SpaceStatus::Available {
            return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
        }
        space.status = SpaceStatus::Reserved;
        space.updated_at = now;
        let request = SpaceRequest {
            id: SpaceRequestId::new(t.next_id()),
            space_id: new.space_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            company: new.company,
            message: new.message,
            status: SpaceRequestStatus::Pending,
            agreement_id: None,
            created_at: now,
            updated_at: now,
        };
        t.space_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn withdraw(&self, id: SpaceRequestId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        let request = t.space_requests.remove(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(space) = t.spaces.get_mut(&request.space_id)
            && space.status == SpaceStatus::Reserved
        {
            space.status = SpaceStatus::Available;
            space.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get(
        &self,
        id: SpaceRequestId,
    ) -> Result<Option<SpaceRequestDetail>, RepositoryError> {
        let t = self.tables.read().await;
        t.space_requests
            .get(&id)
            .map(|r| t.space_request_detail(r))
            .transpose()
    }

    async fn list(
        &self,
        filter: &SpaceRequestFilter,
        page: PageRequest,
    ) -> Result<Page<SpaceRequestDetail>, RepositoryError> {
        let t = self.tables.read().await;
        let rows = newest_first(&t.space_requests)
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| {
                matches_search(
                    filter.search.as_deref(),
                    &[
                        &r.name,
                        r.email.as_str(),
                        r.company.as_deref().unwrap_or_default(),
                    ],
                )
            })
            .map(|r| t.space_request_detail(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_vec(rows, page))
    }

    async fn approve(
        &self,
        id: SpaceRequestId,
        draft: AgreementDraft,
    ) -> Result<(SpaceRequest, Agreement), RepositoryError> {
        let mut t = self.tables.write().await;
        let request = t.space_requests.get(&id).ok_or(RepositoryError::NotFound)?;
        if request.status != SpaceRequestStatus::Pending {
            return Err(RepositoryError::InvalidState(
                "Space request has already been reviewed".to_owned(),
            ));
        }
        if draft.space_id != request.space_id {
            return Err(RepositoryError::InvalidState(
                "Agreement must be for the requested space".to_owned(),
            ));
        }
        let space = t.space(request.space_id)?;
        if !matches!(space.status, SpaceStatus::Reserved | SpaceStatus::Available) {
            return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
        }
        let agreement = t.insert_agreement(draft)?;
        let request = t.space_requests.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        request.status = SpaceRequestStatus::Approved;
        request.agreement_id = Some(agreement.id);
        request.updated_at = agreement.created_at;
        Ok((request.clone(), agreement))
    }

    async fn reject(&self, id: SpaceRequestId) -> Result<SpaceRequest, RepositoryError> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let request = t.space_requests.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if request.status != SpaceRequestStatus::Pending {
            return Err(RepositoryError::InvalidState(
                "Space request has already been reviewed".to_owned(),
            ));
        }
        request.status = SpaceRequestStatus::Rejected;
        request.updated_at = now;
        let request = request.clone();
        if let Some(space) = t.spaces.get_mut(&request.space_id)
            && space.status == SpaceStatus::Reserved
        {
            space.status = SpaceStatus::Available;
            space.updated_at = now;
        }
        Ok(request)
    }
}

#[async_trait]
impl AnalyticsRepository for MemoryDatabase {
    async fn revenue_by_month(&self, months: u32) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        let t = self.tables.read().await;
        let today = Utc::now().date_naive();
        let cutoff = today
            .with_day(1)
            .and_then(|d| d.checked_sub_months(Months::new(months.saturating_sub(1))))
            .unwrap_or(today);
        let mut by_month: BTreeMap<String, (Decimal, u64)> = BTreeMap::new();
        for invoice in t.invoices.values() {
            let Some(paid_at) = invoice.paid_at else {
                continue;
            };
            if invoice.status != InvoiceStatus::Paid || paid_at.date_naive() < cutoff {
                continue;
            }
            let entry = by_month
                .entry(paid_at.format("%Y-%m").to_string())
                .or_default();
            entry.0 += invoice.total_amount;
            entry.1 += 1;
        }
        Ok(by_month
            .into_iter()
            .map(|(month, (total, invoice_count))| MonthlyRevenue {
                month,
                total,
                invoice_count,
            })
            .collect())
    }

    async fn occupancy(&self) -> Result<Vec<WarehouseOccupancy>, RepositoryError> {
        let t = self.tables.read().await;
        let mut rows: Vec<WarehouseOccupancy> = t
            .warehouses
            .values()
            .map(|w| {
                let spaces = t.spaces.values().filter(|s| s.warehouse_id == w.id);
                let (total, occupied) = spaces.fold((0, 0), |(total, occupied), s| {
                    (total + 1, occupied + u64::from(s.status == SpaceStatus::Occupied))
                });
                WarehouseOccupancy::new(w.id, w.name.clone(), total, occupied)
            })
            .collect();
        rows.sort_by(|a, b| a.warehouse_name.cmp(&b.warehouse_name));
        Ok(rows)
    }

    async fn clients_by_business_type(&self) -> Result<Vec<BusinessTypeCount>, RepositoryError> {
        let t = self.tables.read().await;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for stored in t.users.values().filter(|s| s.user.role == Role::Customer) {
            let key = stored
                .user
                .profile
                .business_type
                .clone()
                .unwrap_or_else(|| "Unspecified".to_owned());
            *counts.entry(key).or_default() += 1;
        }
        let mut rows: Vec<BusinessTypeCount> = counts
            .into_iter()
            .map(|(business_type, clients)| BusinessTypeCount {
                business_type,
                clients,
            })
            .collect();
        rows.sort_by(|a, b| b.clients.cmp(&a.clients).then_with(|| a.business_type.cmp(&b.business_type)));
        Ok(rows)
    }

    async fn overview(&self) -> Result<DashboardOverview, RepositoryError> {
        let t = self.tables.read().await;
        let customers = t.users.values().filter(|s| s.user.role == Role::Customer);
        let count = |n: usize| n as u64;
        Ok(DashboardOverview {
            warehouses: count(t.warehouses.len()),
            spaces: count(t.spaces.len()),
            available_spaces: count(
                t.spaces
                    .values()
                    .filter(|s| s.status == SpaceStatus::Available)
                    .count(),
            ),
            clients: count(customers.clone().count()),
            pending_clients: count(
                customers
                    .filter(|s| s.user.status == UserStatus::Pending)
                    .count(),
            ),
            active_agreements: count(
                t.agreements
                    .values()
                    .filter(|a| a.status == AgreementStatus::Active)
                    .count(),
            ),
            open_tickets: count(
                t.tickets
                    .values()
                    .filter(|k| matches!(k.status, TicketStatus::Open | TicketStatus::InProgress))
                    .count(),
            ),
            pending_invoices: count(
                t.invoices
                    .values()
                    .filter(|i| i.status != InvoiceStatus::Paid)
                    .count(),
            ),
            pending_space_requests: count(
                t.space_requests
                    .values()
                    .filter(|r| r.status == SpaceRequestStatus::Pending)
                    .count(),
            ),
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn users(&self) -> &dyn UserRepository {
        self
    }

    fn warehouses(&self) -> &dyn WarehouseRepository {
        self
    }

    fn spaces(&self) -> &dyn SpaceRepository {
        self
    }

    fn agreements(&self) -> &dyn AgreementRepository {
        self
    }

    fn invoices(&self) -> &dyn InvoiceRepository {
        self
    }

    fn tickets(&self) -> &dyn TicketRepository {
        self
    }

    fn space_requests(&self) -> &dyn SpaceRequestRepository {
        self
    }

    fn analytics(&self) -> &dyn AnalyticsRepository {
        self
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use warehub_core::StorageType;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    async fn seed(db: &MemoryDatabase) -> (User, Space) {
        let admin = UserRepository::create(
            db,
            NewUser {
                name: "Ops".to_owned(),
                email: Email::parse("ops@warehub.test").unwrap(),
                password_hash: None,
                role: Role::Admin,
                status: UserStatus::Active,
                profile: BusinessProfile::default(),
            },
        )
        .await
        .unwrap();
        let warehouse = WarehouseRepository::create(
            db,
            WarehouseDraft {
                code: "WH-1".to_owned(),
                name: "North".to_owned(),
                location: "Leeds".to_owned(),
                storage_type: StorageType::Ambient,
                capacity: 1000,
                manager_id: admin.id,
                description: None,
            },
        )
        .await
        .unwrap();
        let space = SpaceRepository::create(
            db,
            SpaceDraft {
                warehouse_id: warehouse.id,
                code: "A-1".to_owned(),
                name: "Bay 1".to_owned(),
                space_type: "Pallet bay".to_owned(),
                size: dec(120),
                rate: dec(450),
                status: None,
            },
        )
        .await
        .unwrap();
        (admin, space)
    }

    fn draft(client: UserId, space: SpaceId) -> AgreementDraft {
        AgreementDraft {
            client_id: client,
            space_id: space,
            monthly_rent: dec(450),
            deposit: dec(900),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            terms: None,
            status: AgreementStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_agreement_occupies_and_delete_releases() {
        let db = MemoryDatabase::new();
        let (admin, space) = seed(&db).await;

        let agreement = AgreementRepository::create(&db, draft(admin.id, space.id))
            .await
            .unwrap();
        let occupied = SpaceRepository::get(&db, space.id).await.unwrap().unwrap();
        assert_eq!(occupied.space.status, SpaceStatus::Occupied);

        let second = AgreementRepository::create(&db, draft(admin.id, space.id)).await;
        assert!(matches!(second, Err(RepositoryError::InvalidState(_))));

        AgreementRepository::delete(&db, agreement.id).await.unwrap();
        let freed = SpaceRepository::get(&db, space.id).await.unwrap().unwrap();
        assert_eq!(freed.space.status, SpaceStatus::Available);
    }

    #[tokio::test]
    async fn test_deactivating_agreement_frees_space() {
        let db = MemoryDatabase::new();
        let (admin, space) = seed(&db).await;
        let agreement = AgreementRepository::create(&db, draft(admin.id, space.id))
            .await
            .unwrap();

        let d = draft(admin.id, space.id);
        let changes = AgreementChanges {
            monthly_rent: d.monthly_rent,
            deposit: d.deposit,
            start_date: d.start_date,
            end_date: d.end_date,
            terms: None,
            status: AgreementStatus::Inactive,
        };
        AgreementRepository::update(&db, agreement.id, changes)
            .await
            .unwrap();
        let freed = SpaceRepository::get(&db, space.id).await.unwrap().unwrap();
        assert_eq!(freed.space.status, SpaceStatus::Available);
    }

    #[tokio::test]
    async fn test_manual_occupied_is_refused() {
        let db = MemoryDatabase::new();
        let (_, space) = seed(&db).await;
        let detail = SpaceRepository::get(&db, space.id).await.unwrap().unwrap();
        let result = SpaceRepository::update(
            &db,
            space.id,
            SpaceDraft {
                warehouse_id: detail.space.warehouse_id,
                code: detail.space.code,
                name: detail.space.name,
                space_type: detail.space.space_type,
                size: detail.space.size,
                rate: detail.space.rate,
                status: Some(SpaceStatus::Occupied),
            },
        )
        .await;
        assert!(matches!(result, Err(RepositoryError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_update_without_status_keeps_occupied() {
        let db = MemoryDatabase::new();
        let (admin, space) = seed(&db).await;
        AgreementRepository::create(&db, draft(admin.id, space.id))
            .await
            .unwrap();

        let updated = SpaceRepository::update(
            &db,
            space.id,
            SpaceDraft {
                warehouse_id: space.warehouse_id,
                code: "A-2".to_owned(),
                name: "Bay 2".to_owned(),
                space_type: space.space_type.clone(),
                size: space.size,
                rate: space.rate,
                status: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.code, "A-2");
        assert_eq!(updated.status, SpaceStatus::Occupied);
    }

    #[tokio::test]
    async fn test_space_request_reserve_and_reject() {
        let db = MemoryDatabase::new();
        let (_, space) = seed(&db).await;
        let request = db
            .submit(NewSpaceRequest {
                space_id: space.id,
                name: "Acme".to_owned(),
                email: Email::parse("a@b.com").unwrap(),
                phone: None,
                company: None,
                message: None,
            })
            .await
            .unwrap();
        let reserved = SpaceRepository::get(&db, space.id).await.unwrap().unwrap();
        assert_eq!(reserved.space.status, SpaceStatus::Reserved);

        db.reject(request.id).await.unwrap();
        let freed = SpaceRepository::get(&db, space.id).await.unwrap().unwrap();
        assert_eq!(freed.space.status, SpaceStatus::Available);
        assert!(matches!(
            db.reject(request.id).await,
            Err(RepositoryError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_warehouse_with_occupied_space_is_not_deleted() {
        let db = MemoryDatabase::new();
        let (admin, space) = seed(&db).await;
        AgreementRepository::create(&db, draft(admin.id, space.id))
            .await
            .unwrap();
        let result = WarehouseRepository::delete(&db, space.warehouse_id).await;
        assert!(matches!(result, Err(RepositoryError::InvalidState(_))));
        assert!(WarehouseRepository::get(&db, space.warehouse_id).await.unwrap().is_some());
    }

    #[test]
    fn test_check_manual_status_change() {
        use SpaceStatus::{Available, Maintenance, Occupied};
        assert!(check_manual_status_change(Available, Maintenance).is_ok());
        assert!(check_manual_status_change(Occupied, Occupied).is_ok());
        assert!(check_manual_status_change(Occupied, Available).is_err());
        assert!(check_manual_status_change(Available, Occupied).is_err());
    }
}
