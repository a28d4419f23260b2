use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use warehub_core::{AgreementId, AgreementStatus, Page, PageRequest, SpaceId, SpaceStatus, UserId};

use super::{PgDatabase, push_page, push_search};
use crate::db::{AgreementRepository, RepositoryError, count};
use crate::models::{
    Agreement, AgreementChanges, AgreementDetail, AgreementDraft, AgreementFilter, AgreementStats,
};

const AGREEMENT_COLUMNS: &str = "a.id, a.client_id, a.space_id, a.monthly_rent, a.deposit, \
                                 a.start_date, a.end_date, a.terms, a.status, a.created_at, \
                                 a.updated_at";

const DETAIL_FROM: &str = "FROM agreements a \
                           JOIN users u ON u.id = a.client_id \
                           JOIN spaces s ON s.id = a.space_id \
                           JOIN warehouses w ON w.id = s.warehouse_id";

pub(super) const SPACE_NOT_AVAILABLE: &str = "Space is not available";

#[derive(Debug, sqlx::FromRow)]
struct AgreementRow {
    id: AgreementId,
    client_id: UserId,
    space_id: SpaceId,
    monthly_rent: Decimal,
    deposit: Decimal,
    start_date: NaiveDate,
    end_date: NaiveDate,
    terms: Option<String>,
    status: AgreementStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AgreementRow> for Agreement {
    fn from(row: AgreementRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            space_id: row.space_id,
            monthly_rent: row.monthly_rent,
            deposit: row.deposit,
            start_date: row.start_date,
            end_date: row.end_date,
            terms: row.terms,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    #[sqlx(flatten)]
    agreement: AgreementRow,
    client_name: String,
    space_code: String,
    space_name: String,
    warehouse_name: String,
}

impl From<DetailRow> for AgreementDetail {
    fn from(row: DetailRow) -> Self {
        Self {
            agreement: row.agreement.into(),
            client_name: row.client_name,
            space_code: row.space_code,
            space_name: row.space_name,
            warehouse_name: row.warehouse_name,
        }
    }
}

fn detail_select() -> String {
    format!(
        "SELECT {AGREEMENT_COLUMNS}, u.name AS client_name, s.code AS space_code, \
         s.name AS space_name, w.name AS warehouse_name {DETAIL_FROM}"
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AgreementFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND a.status = ").push_bind(status);
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND a.client_id = ").push_bind(client_id);
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["u.name", "s.code", "s.name"],
    );
}

/// Lock a space row and return its status.
pub(super) async fn lock_space(
    conn: &mut PgConnection,
    space: SpaceId,
) -> Result<SpaceStatus, RepositoryError> {
    sqlx::query_scalar("SELECT status FROM spaces WHERE id = $1 FOR UPDATE")
        .bind(space)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)
}

pub(super) async fn set_space_status(
    conn: &mut PgConnection,
    space: SpaceId,
    status: SpaceStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE spaces SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(space)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

/// Insert an agreement and occupy its space. The space row must already
/// be locked by the caller.
pub(super) async fn insert_agreement(
    conn: &mut PgConnection,
    draft: &AgreementDraft,
) -> Result<Agreement, RepositoryError> {
    let row = sqlx::query_as::<_, AgreementRow>(&format!(
        "INSERT INTO agreements AS a (client_id, space_id, monthly_rent, deposit, start_date, \
         end_date, terms, status) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {AGREEMENT_COLUMNS}"
    ))
    .bind(draft.client_id)
    .bind(draft.space_id)
    .bind(draft.monthly_rent)
    .bind(draft.deposit)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(&draft.terms)
    .bind(draft.status)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            // agreements_one_holding_per_space
            if db_err.is_unique_violation() {
                return RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return RepositoryError::NotFound;
            }
        }
        RepositoryError::Database(e)
    })?;

    if draft.status.holds_space() {
        set_space_status(conn, draft.space_id, SpaceStatus::Occupied).await?;
    }
    Ok(row.into())
}

#[async_trait]
impl AgreementRepository for PgDatabase {
    async fn create(&self, draft: AgreementDraft) -> Result<Agreement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if lock_space(&mut tx, draft.space_id).await? != SpaceStatus::Available {
            return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
        }
        let agreement = insert_agreement(&mut tx, &draft).await?;

        tx.commit().await?;
        Ok(agreement)
    }

    async fn get(&self, id: AgreementId) -> Result<Option<AgreementDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, DetailRow>(&format!("{} WHERE a.id = $1", detail_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &AgreementFilter,
        page: PageRequest,
    ) -> Result<Page<AgreementDetail>, RepositoryError> {
        let mut total = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {DETAIL_FROM}"));
        push_filters(&mut total, filter);
        let total: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(detail_select());
        push_filters(&mut qb, filter);
        push_page(&mut qb, "a.created_at DESC, a.id DESC", page);
        let rows: Vec<DetailRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            count(total),
        ))
    }

    async fn stats(&self, filter: &AgreementFilter) -> Result<AgreementStats, RepositoryError> {
        let rows: Vec<(AgreementStatus, i64, Option<Decimal>)> = sqlx::query_as(
            "SELECT status, COUNT(*), SUM(monthly_rent) FROM agreements \
             WHERE ($1::INTEGER IS NULL OR client_id = $1) GROUP BY status",
        )
        .bind(filter.client_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = AgreementStats::default();
        for (status, n, rent) in rows {
            stats.total += count(n);
            stats.by_status.insert(status, count(n));
            if status == AgreementStatus::Active {
                stats.active_monthly_rent = rent.unwrap_or_default();
            }
        }
        Ok(stats)
    }

    async fn update(
        &self,
        id: AgreementId,
        changes: AgreementChanges,
    ) -> Result<Agreement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (space_id, status): (SpaceId, AgreementStatus) =
            sqlx::query_as("SELECT space_id, status FROM agreements WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        let was_holding = status.holds_space();
        let will_hold = changes.status.holds_space();
        if !was_holding && will_hold {
            if lock_space(&mut tx, space_id).await? != SpaceStatus::Available {
                return Err(RepositoryError::InvalidState(SPACE_NOT_AVAILABLE.to_owned()));
            }
            set_space_status(&mut tx, space_id, SpaceStatus::Occupied).await?;
        } else if was_holding && !will_hold {
            lock_space(&mut tx, space_id).await?;
            set_space_status(&mut tx, space_id, SpaceStatus::Available).await?;
        }

        let row = sqlx::query_as::<_, AgreementRow>(&format!(
            "UPDATE agreements AS a SET monthly_rent = $2, deposit = $3, start_date = $4, \
             end_date = $5, terms = $6, status = $7, updated_at = NOW() WHERE a.id = $1 \
             RETURNING {AGREEMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.monthly_rent)
        .bind(changes.deposit)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(&changes.terms)
        .bind(changes.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete(&self, id: AgreementId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (space_id, status): (SpaceId, AgreementStatus) = sqlx::query_as(
            "DELETE FROM agreements WHERE id = $1 RETURNING space_id, status",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if status.holds_space() {
            lock_space(&mut tx, space_id).await?;
            set_space_status(&mut tx, space_id, SpaceStatus::Available).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn client_has_agreement(
        &self,
        client: UserId,
        space: SpaceId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM agreements WHERE client_id = $1 AND space_id = $2)",
        )
        .bind(client)
        .bind(space)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
