use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use warehub_core::{
    AgreementId, Email, Page, PageRequest, SpaceId, SpaceRequestId, SpaceRequestStatus,
    SpaceStatus,
};

use super::agreements::{SPACE_NOT_AVAILABLE, insert_agreement, lock_space, set_space_status};
use super::{PgDatabase, push_page, push_search};
use crate::db::{RepositoryError, SpaceRequestRepository, count};
use crate::models::{
    Agreement, AgreementDraft, NewSpaceRequest, SpaceRequest, SpaceRequestDetail,
    SpaceRequestFilter,
};

const REQUEST_COLUMNS: &str = "r.id, r.space_id, r.name, r.email, r.phone, r.company, r.message, \
                               r.status, r.agreement_id, r.created_at, r.updated_at";

const DETAIL_FROM: &str = "FROM space_requests r \
                           JOIN spaces s ON s.id = r.space_id \
                           JOIN warehouses w ON w.id = s.warehouse_id";

const ALREADY_REVIEWED: &str = "Space request has already been reviewed";

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: SpaceRequestId,
    space_id: SpaceId,
    name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    message: Option<String>,
    status: SpaceRequestStatus,
    agreement_id: Option<AgreementId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for SpaceRequest {
    type Error = RepositoryError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            space_id: row.space_id,
            name: row.name,
            email,
            phone: row.phone,
            company: row.company,
            message: row.message,
            status: row.status,
            agreement_id: row.agreement_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    #[sqlx(flatten)]
    request: RequestRow,
    space_code: String,
    space_name: String,
    warehouse_name: String,
}

impl TryFrom<DetailRow> for SpaceRequestDetail {
    type Error = RepositoryError;

    fn try_from(row: DetailRow) -> Result<Self, Self::Error> {
        Ok(Self {
            request: row.request.try_into()?,
            space_code: row.space_code,
            space_name: row.space_name,
            warehouse_name: row.warehouse_name,
        })
    }
}

fn detail_select() -> String {
    format!(
        "SELECT {REQUEST_COLUMNS}, s.code AS space_code, s.name AS space_name, \
         w.name AS warehouse_name {DETAIL_FROM}"
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SpaceRequestFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND r.status = ").push_bind(status);
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["r.name", "r.email", "r.company"],
    );
}

#[async_trait]
impl SpaceRequestRepository for PgDatabase {
    async fn submit(&self, request: NewSpaceRequest) -> Result<SpaceRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if lock_space(&mut tx, request.space_id).await? != SpaceStatus::Available {
            return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
        }
        set_space_status(&mut tx, request.space_id, SpaceStatus::Reserved).await?;

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "INSERT INTO space_requests AS r (space_id, name, email, phone, company, message) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(request.space_id)
        .bind(&request.name)
        .bind(request.email.as_str())
        .bind(&request.phone)
        .bind(&request.company)
        .bind(&request.message)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn withdraw(&self, id: SpaceRequestId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let space_id: SpaceId =
            sqlx::query_scalar("DELETE FROM space_requests WHERE id = $1 RETURNING space_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if lock_space(&mut tx, space_id).await? == SpaceStatus::Reserved {
            set_space_status(&mut tx, space_id, SpaceStatus::Available).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(
        &self,
        id: SpaceRequestId,
    ) -> Result<Option<SpaceRequestDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, DetailRow>(&format!("{} WHERE r.id = $1", detail_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        filter: &SpaceRequestFilter,
        page: PageRequest,
    ) -> Result<Page<SpaceRequestDetail>, RepositoryError> {
        let mut total = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {DETAIL_FROM}"));
        push_filters(&mut total, filter);
        let total: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(detail_select());
        push_filters(&mut qb, filter);
        push_page(&mut qb, "r.created_at DESC, r.id DESC", page);
        let rows: Vec<DetailRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, page, count(total)))
    }

    async fn approve(
        &self,
        id: SpaceRequestId,
        draft: AgreementDraft,
    ) -> Result<(SpaceRequest, Agreement), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (space_id, status): (SpaceId, SpaceRequestStatus) = sqlx::query_as(
            "SELECT space_id, status FROM space_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if status != SpaceRequestStatus::Pending {
            return Err(RepositoryError::InvalidState(ALREADY_REVIEWED.to_owned()));
        }
        if draft.space_id != space_id {
            return Err(RepositoryError::InvalidState(
                "Agreement must be for the requested space".to_owned(),
            ));
        }
        let space_status = lock_space(&mut tx, space_id).await?;
        if !matches!(space_status, SpaceStatus::Reserved | SpaceStatus::Available) {
            return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
        }

        let agreement = insert_agreement(&mut tx, &draft).await?;

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "UPDATE space_requests AS r SET status = 'APPROVED', agreement_id = $2, \
             updated_at = NOW() WHERE r.id = $1 RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(id)
        .bind(agreement.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((row.try_into()?, agreement))
    }

    async fn reject(&self, id: SpaceRequestId) -> Result<SpaceRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "UPDATE space_requests AS r SET status = 'REJECTED', updated_at = NOW() \
             WHERE r.id = $1 AND r.status = 'PENDING' RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM space_requests WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                RepositoryError::InvalidState(ALREADY_REVIEWED.to_owned())
            } else {
                RepositoryError::NotFound
            });
        };

        if lock_space(&mut tx, row.space_id).await? == SpaceStatus::Reserved {
            set_space_status(&mut tx, row.space_id, SpaceStatus::Available).await?;
        }

        tx.commit().await?;
        row.try_into()
    }
}
