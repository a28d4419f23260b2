//! Lease agreement actions.
//!
//! Creating, updating and deleting an agreement moves its space between
//! `AVAILABLE` and `OCCUPIED` inside the same repository transaction.

use serde::Deserialize;
use tracing::instrument;

use warehub_core::{AgreementId, AgreementStatus, Capability, Role, SpaceId, UserId, UserStatus};

use super::{ActionError, ActionResult, ListQuery, Listing, Validator, listing_key};
use crate::db::RepositoryError;
use crate::models::{
    Agreement, AgreementChanges, AgreementDetail, AgreementDraft, AgreementFilter,
    AgreementStats, Caller,
};
use crate::services::view_cache::{SPACE_STATUS_VIEWS, View};
use crate::state::AppState;

const ENTITY: &str = "Agreement";

pub type AgreementListing = Listing<AgreementDetail, AgreementStats>;

/// Submitted agreement fields. Client and space are only read on create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgreementForm {
    pub client_id: String,
    pub space_id: String,
    pub monthly_rent: String,
    pub deposit: String,
    pub start_date: String,
    pub end_date: String,
    pub terms: String,
    pub status: String,
}

impl AgreementForm {
    fn validate_terms(&self, v: &mut Validator) -> AgreementChanges {
        let monthly_rent = v.positive_decimal("monthlyRent", "Monthly rent", &self.monthly_rent);
        let deposit = v.non_negative_decimal("deposit", "Deposit", &self.deposit);
        let start_date = v.date("startDate", "Start date", &self.start_date);
        let end_date = v.date("endDate", "End date", &self.end_date);
        if v.is_valid() {
            v.check(
                end_date > start_date,
                "endDate",
                "End date must be after the start date",
            );
        }
        let terms = v.optional("terms", "Terms", &self.terms);
        let status = v.parse_or("status", "Status", &self.status, AgreementStatus::Active);

        AgreementChanges {
            monthly_rent,
            deposit,
            start_date,
            end_date,
            terms,
            status,
        }
    }

    fn validate_new(&self) -> ActionResult<AgreementDraft> {
        let mut v = Validator::new();
        let client_id = v.parse::<UserId>("clientId", "Client", &self.client_id);
        let space_id = v.parse::<SpaceId>("spaceId", "Space", &self.space_id);
        let terms = self.validate_terms(&mut v);
        v.finish()?;

        Ok(AgreementDraft {
            client_id: client_id.unwrap_or(UserId::new(0)),
            space_id: space_id.unwrap_or(SpaceId::new(0)),
            monthly_rent: terms.monthly_rent,
            deposit: terms.deposit,
            start_date: terms.start_date,
            end_date: terms.end_date,
            terms: terms.terms,
            status: terms.status,
        })
    }

    /// Validate an approval, where the space comes from the request.
    pub(crate) fn validate_approval(&self) -> ActionResult<(UserId, AgreementChanges)> {
        let mut v = Validator::new();
        let client_id = v.parse::<UserId>("clientId", "Client", &self.client_id);
        let terms = self.validate_terms(&mut v);
        v.check(
            terms.status.holds_space(),
            "status",
            "An approved request must start an active or pending agreement",
        );
        v.finish()?;
        Ok((client_id.unwrap_or(UserId::new(0)), terms))
    }

    fn validate_changes(&self) -> ActionResult<AgreementChanges> {
        let mut v = Validator::new();
        let changes = self.validate_terms(&mut v);
        v.finish()?;
        Ok(changes)
    }
}

/// Check that `client` is an active customer who may hold a lease.
pub(crate) async fn require_active_customer(state: &AppState, client: UserId) -> ActionResult<()> {
    let user = state
        .db()
        .users()
        .get(client)
        .await
        .map_err(ActionError::from_store("Client"))?
        .ok_or_else(|| ActionError::field("clientId", "Client not found"))?;
    if user.role != Role::Customer || user.status != UserStatus::Active {
        return Err(ActionError::field(
            "clientId",
            "Client must be an active customer",
        ));
    }
    Ok(())
}

fn filter_from(query: &ListQuery, v: &mut Validator, client_id: Option<UserId>) -> AgreementFilter {
    AgreementFilter {
        search: query.search(),
        status: v.parse_optional("status", "Status", query.status.as_deref().unwrap_or_default()),
        client_id,
    }
}

async fn load_listing(
    state: &AppState,
    filter: AgreementFilter,
    query: &ListQuery,
) -> ActionResult<AgreementListing> {
    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Agreements, listing_key(&filter, page), || async {
            let items = db.agreements().list(&filter, page).await?;
            let stats = db.agreements().stats(&filter).await?;
            Ok::<_, RepositoryError>(Listing { page: items, stats })
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<AgreementListing> {
    caller.require(Capability::ManageAgreements)?;
    let mut v = Validator::new();
    let filter = filter_from(query, &mut v, None);
    v.finish()?;
    load_listing(state, filter, query).await
}

/// The caller's own agreements.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn mine(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<AgreementListing> {
    caller.require(Capability::ViewOwnLeases)?;
    let mut v = Validator::new();
    let filter = filter_from(query, &mut v, Some(caller.id));
    v.finish()?;
    load_listing(state, filter, query).await
}

/// Fetch an agreement. Customers only see their own.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(state: &AppState, caller: &Caller, id: AgreementId) -> ActionResult<AgreementDetail> {
    let detail = state
        .db()
        .agreements()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or(ActionError::NotFound(ENTITY))?;

    if caller.require(Capability::ManageAgreements).is_ok() {
        return Ok(detail);
    }
    caller.require(Capability::ViewOwnLeases)?;
    if detail.agreement.client_id != caller.id {
        return Err(ActionError::NotFound(ENTITY));
    }
    Ok(detail)
}

/// Create an agreement and occupy its space.
///
/// The space must be `AVAILABLE`; otherwise nothing is written.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn create(state: &AppState, caller: &Caller, form: AgreementForm) -> ActionResult<Agreement> {
    let draft = form.validate_new()?;
    caller.require(Capability::ManageAgreements)?;
    require_active_customer(state, draft.client_id).await?;

    let agreement = state
        .db()
        .agreements()
        .create(draft)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ActionError::field("spaceId", "Space not found"),
            other => ActionError::from_store(ENTITY)(other),
        })?;
    state.views().invalidate(&[View::Agreements]);
    state.views().invalidate(SPACE_STATUS_VIEWS);

    tracing::info!(
        agreement_id = %agreement.id,
        space_id = %agreement.space_id,
        client_id = %agreement.client_id,
        "Agreement created"
    );
    Ok(agreement)
}

/// Update terms, dates, rent and status.
///
/// Moving to `INACTIVE` frees the space; moving back re-occupies it only if
/// it is still available.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn update(
    state: &AppState,
    caller: &Caller,
    id: AgreementId,
    form: AgreementForm,
) -> ActionResult<Agreement> {
    let changes = form.validate_changes()?;
    caller.require(Capability::ManageAgreements)?;

    let agreement = state
        .db()
        .agreements()
        .update(id, changes)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Agreements]);
    state.views().invalidate(SPACE_STATUS_VIEWS);

    tracing::info!(agreement_id = %agreement.id, status = %agreement.status, "Agreement updated");
    Ok(agreement)
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(state: &AppState, caller: &Caller, id: AgreementId) -> ActionResult<()> {
    caller.require(Capability::ManageAgreements)?;

    state
        .db()
        .agreements()
        .delete(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Agreements]);
    state.views().invalidate(SPACE_STATUS_VIEWS);

    tracing::info!(agreement_id = %id, "Agreement deleted");
    Ok(())
}
