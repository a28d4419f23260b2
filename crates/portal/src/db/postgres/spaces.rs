use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use warehub_core::{Page, PageRequest, SpaceId, SpaceStatus, UserId, WarehouseId};

use super::{PgDatabase, conflict_on_unique, missing_on_foreign_key, push_page, push_search};
use crate::db::{RepositoryError, SpaceRepository, check_manual_status_change, count};
use crate::models::{Space, SpaceDetail, SpaceDraft, SpaceFilter, SpaceStats};

const SPACE_COLUMNS: &str = "s.id, s.warehouse_id, s.code, s.name, s.space_type, \
                                s.size, s.rate, s.status, s.created_at, s.updated_at";

const DETAIL_FROM: &str = "FROM spaces s JOIN warehouses w ON w.id = s.warehouse_id";

#[derive(Debug, sqlx::FromRow)]
struct SpaceRow {
    id: SpaceId,
    warehouse_id: WarehouseId,
    code: String,
    name: String,
    space_type: String,
    size: Decimal,
    rate: Decimal,
    status: SpaceStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SpaceRow> for Space {
    fn from(row: SpaceRow) -> Self {
        Self {
            id: row.id,
            warehouse_id: row.warehouse_id,
            code: row.code,
            name: row.name,
            space_type: row.space_type,
            size: row.size,
            rate: row.rate,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    #[sqlx(flatten)]
    space: SpaceRow,
    warehouse_name: String,
    warehouse_location: String,
}

impl From<DetailRow> for SpaceDetail {
    fn from(row: DetailRow) -> Self {
        Self {
            space: row.space.into(),
            warehouse_name: row.warehouse_name,
            warehouse_location: row.warehouse_location,
        }
    }
}

fn detail_select() -> String {
    format!(
        "SELECT {SPACE_COLUMNS}, w.name AS warehouse_name, w.location AS warehouse_location \
         {DETAIL_FROM}"
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SpaceFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status);
    }
    if let Some(warehouse_id) = filter.warehouse_id {
        qb.push(" AND s.warehouse_id = ").push_bind(warehouse_id);
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["s.code", "s.name", "s.space_type"],
    );
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    match conflict_on_unique(e, "code") {
        RepositoryError::Database(e) => missing_on_foreign_key(e),
        other => other,
    }
}

#[async_trait]
impl SpaceRepository for PgDatabase {
    async fn create(&self, draft: SpaceDraft) -> Result<Space, RepositoryError> {
        let row = sqlx::query_as::<_, SpaceRow>(&format!(
            "INSERT INTO spaces AS s (warehouse_id, code, name, space_type, size, rate, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {SPACE_COLUMNS}"
        ))
        .bind(draft.warehouse_id)
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(&draft.space_type)
        .bind(draft.size)
        .bind(draft.rate)
        .bind(draft.status.unwrap_or(SpaceStatus::Available))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(row.into())
    }

    async fn get(&self, id: SpaceId) -> Result<Option<SpaceDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, DetailRow>(&format!("{} WHERE s.id = $1", detail_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &SpaceFilter,
        page: PageRequest,
    ) -> Result<Page<SpaceDetail>, RepositoryError> {
        let mut total = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {DETAIL_FROM}"));
        push_filters(&mut total, filter);
        let total: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(detail_select());
        push_filters(&mut qb, filter);
        push_page(&mut qb, "s.created_at DESC, s.id DESC", page);
        let rows: Vec<DetailRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            count(total),
        ))
    }

    async fn stats(&self, filter: &SpaceFilter) -> Result<SpaceStats, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT s.status, COUNT(*) {DETAIL_FROM}"));
        push_filters(&mut qb, filter);
        qb.push(" GROUP BY s.status");
        let rows: Vec<(SpaceStatus, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut stats = SpaceStats::default();
        for (status, n) in rows {
            stats.total += count(n);
            stats.by_status.insert(status, count(n));
        }
        Ok(stats)
    }

    async fn update(&self, id: SpaceId, draft: SpaceDraft) -> Result<Space, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: SpaceStatus =
            sqlx::query_scalar("SELECT status FROM spaces WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;
        let status = draft.status.unwrap_or(current);
        check_manual_status_change(current, status)?;

        let row = sqlx::query_as::<_, SpaceRow>(&format!(
            "UPDATE spaces AS s SET warehouse_id = $2, code = $3, name = $4, space_type = $5, \
             size = $6, rate = $7, status = $8, updated_at = NOW() WHERE s.id = $1 \
             RETURNING {SPACE_COLUMNS}"
        ))
        .bind(id)
        .bind(draft.warehouse_id)
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(&draft.space_type)
        .bind(draft.size)
        .bind(draft.rate)
        .bind(status)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete(&self, id: SpaceId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM spaces WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::InvalidState(
                        "Cannot delete a space with agreements or invoices".to_owned(),
                    );
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_for_client(&self, client: UserId) -> Result<Vec<SpaceDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, DetailRow>(&format!(
            "{} JOIN agreements a ON a.space_id = s.id \
             WHERE a.client_id = $1 AND a.status <> 'INACTIVE' \
             ORDER BY a.created_at DESC",
            detail_select()
        ))
        .bind(client)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
