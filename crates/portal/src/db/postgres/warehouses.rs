use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use warehub_core::{Page, PageRequest, SpaceStatus, StorageType, UserId, WarehouseId};

use super::{PgDatabase, conflict_on_unique, missing_on_foreign_key, push_page, push_search};
use crate::db::{RepositoryError, WarehouseRepository, count};
use crate::models::{Warehouse, WarehouseDraft, WarehouseFilter, WarehouseStats, WarehouseSummary};

const WAREHOUSE_COLUMNS: &str = "w.id, w.code, w.name, w.location, w.storage_type, w.capacity, \
                                 w.manager_id, w.description, w.created_at, w.updated_at";

const SUMMARY_FROM: &str = "FROM warehouses w JOIN users u ON u.id = w.manager_id";

#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    id: WarehouseId,
    code: String,
    name: String,
    location: String,
    storage_type: StorageType,
    capacity: i32,
    manager_id: UserId,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            location: row.location,
            storage_type: row.storage_type,
            capacity: row.capacity,
            manager_id: row.manager_id,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    warehouse: WarehouseRow,
    manager_name: String,
    space_count: i64,
    occupied_count: i64,
}

impl From<SummaryRow> for WarehouseSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            warehouse: row.warehouse.into(),
            manager_name: row.manager_name,
            space_count: count(row.space_count),
            occupied_count: count(row.occupied_count),
        }
    }
}

fn summary_select() -> String {
    format!(
        "SELECT {WAREHOUSE_COLUMNS}, u.name AS manager_name, \
         (SELECT COUNT(*) FROM spaces s WHERE s.warehouse_id = w.id) AS space_count, \
         (SELECT COUNT(*) FROM spaces s WHERE s.warehouse_id = w.id AND s.status = 'OCCUPIED') \
         AS occupied_count {SUMMARY_FROM}"
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &WarehouseFilter) {
    qb.push(" WHERE TRUE");
    if let Some(storage_type) = filter.storage_type {
        qb.push(" AND w.storage_type = ").push_bind(storage_type);
    }
    push_search(
        qb,
        filter.search.as_deref(),
        &["w.code", "w.name", "w.location"],
    );
}

#[async_trait]
impl WarehouseRepository for PgDatabase {
    async fn create(&self, draft: WarehouseDraft) -> Result<Warehouse, RepositoryError> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "INSERT INTO warehouses AS w (code, name, location, storage_type, capacity, \
             manager_id, description) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING w.id, w.code, w.name, w.location, w.storage_type, w.capacity, \
             w.manager_id, w.description, w.created_at, w.updated_at",
        )
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(&draft.location)
        .bind(draft.storage_type)
        .bind(draft.capacity)
        .bind(draft.manager_id)
        .bind(&draft.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match conflict_on_unique(e, "code") {
            RepositoryError::Database(e) => missing_on_foreign_key(e),
            other => other,
        })?;

        Ok(row.into())
    }

    async fn get(&self, id: WarehouseId) -> Result<Option<WarehouseSummary>, RepositoryError> {
        let row = sqlx::query_as::<_, SummaryRow>(&format!("{} WHERE w.id = $1", summary_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &WarehouseFilter,
        page: PageRequest,
    ) -> Result<Page<WarehouseSummary>, RepositoryError> {
        let mut total =
            QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {SUMMARY_FROM}"));
        push_filters(&mut total, filter);
        let total: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(summary_select());
        push_filters(&mut qb, filter);
        push_page(&mut qb, "w.created_at DESC, w.id DESC", page);
        let rows: Vec<SummaryRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            count(total),
        ))
    }

    async fn stats(&self) -> Result<WarehouseStats, RepositoryError> {
        let (total, capacity): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), SUM(capacity)::BIGINT FROM warehouses")
                .fetch_one(&self.pool)
                .await?;
        let by_status: Vec<(SpaceStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM spaces GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        Ok(WarehouseStats {
            total: count(total),
            total_capacity: capacity.unwrap_or_default(),
            spaces_by_status: by_status
                .into_iter()
                .map(|(status, n)| (status, count(n)))
                .collect(),
        })
    }

    async fn update(
        &self,
        id: WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<Warehouse, RepositoryError> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "UPDATE warehouses AS w SET code = $2, name = $3, location = $4, storage_type = $5, \
             capacity = $6, manager_id = $7, description = $8, updated_at = NOW() \
             WHERE w.id = $1 \
             RETURNING w.id, w.code, w.name, w.location, w.storage_type, w.capacity, \
             w.manager_id, w.description, w.created_at, w.updated_at",
        )
        .bind(id)
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(&draft.location)
        .bind(draft.storage_type)
        .bind(draft.capacity)
        .bind(draft.manager_id)
        .bind(&draft.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match conflict_on_unique(e, "code") {
            RepositoryError::Database(e) => missing_on_foreign_key(e),
            other => other,
        })?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn delete(&self, id: WarehouseId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT id FROM warehouses WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let statuses: Vec<SpaceStatus> =
            sqlx::query_scalar("SELECT status FROM spaces WHERE warehouse_id = $1 FOR UPDATE")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        if statuses
            .iter()
            .any(|s| matches!(s, SpaceStatus::Occupied | SpaceStatus::Reserved))
        {
            return Err(RepositoryError::InvalidState(
                "Cannot delete a warehouse with occupied or reserved spaces".to_owned(),
            ));
        }

        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM agreements a JOIN spaces s ON s.id = a.space_id \
             WHERE s.warehouse_id = $1) \
             OR EXISTS (SELECT 1 FROM invoices i JOIN spaces s ON s.id = i.space_id \
             WHERE s.warehouse_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if has_history {
            return Err(RepositoryError::InvalidState(
                "Cannot delete a warehouse whose spaces have agreements or invoices".to_owned(),
            ));
        }

        // Spaces, their requests and ticket links follow via ON DELETE rules.
        sqlx::query("DELETE FROM warehouses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
