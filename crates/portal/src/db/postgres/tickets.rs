use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use warehub_core::{
    Page, PageRequest, SpaceId, TicketCategory, TicketId, TicketPriority, TicketStatus, UserId,
};

use super::{PgDatabase, missing_on_foreign_key, push_page, push_search};
use crate::db::{RepositoryError, TicketRepository, count};
use crate::models::{
    NewTicket, SupportTicket, TicketChanges, TicketDetail, TicketFilter, TicketStats,
};

const TICKET_COLUMNS: &str = "t.id, t.client_id, t.space_id, t.subject, t.message, t.category, \
                              t.priority, t.status, t.attachment_url, t.resolution, \
                              t.resolved_at, t.created_at, t.updated_at";

const DETAIL_FROM: &str = "FROM support_tickets t \
                           JOIN users u ON u.id = t.client_id \
                           LEFT JOIN spaces s ON s.id = t.space_id";

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: TicketId,
    client_id: UserId,
    space_id: Option<SpaceId>,
    subject: String,
    message: String,
    category: TicketCategory,
    priority: TicketPriority,
    status: TicketStatus,
    attachment_url: Option<String>,
    resolution: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketRow> for SupportTicket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            space_id: row.space_id,
            subject: row.subject,
            message: row.message,
            category: row.category,
            priority: row.priority,
            status: row.status,
            attachment_url: row.attachment_url,
            resolution: row.resolution,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    client_name: String,
    space_code: Option<String>,
}

impl From<DetailRow> for TicketDetail {
    fn from(row: DetailRow) -> Self {
        Self {
            ticket: row.ticket.into(),
            client_name: row.client_name,
            space_code: row.space_code,
        }
    }
}

fn detail_select() -> String {
    format!("SELECT {TICKET_COLUMNS}, u.name AS client_name, s.code AS space_code {DETAIL_FROM}")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }
    if let Some(category) = filter.category {
        qb.push(" AND t.category = ").push_bind(category);
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND t.client_id = ").push_bind(client_id);
    }
    push_search(qb, filter.search.as_deref(), &["t.subject", "t.message"]);
}

#[async_trait]
impl TicketRepository for PgDatabase {
    async fn create(&self, ticket: NewTicket) -> Result<SupportTicket, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "INSERT INTO support_tickets AS t (client_id, space_id, subject, message, category, \
             priority, attachment_url) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(ticket.client_id)
        .bind(ticket.space_id)
        .bind(&ticket.subject)
        .bind(&ticket.message)
        .bind(ticket.category)
        .bind(ticket.priority)
        .bind(&ticket.attachment_url)
        .fetch_one(&self.pool)
        .await
        .map_err(missing_on_foreign_key)?;

        Ok(row.into())
    }

    async fn get(&self, id: TicketId) -> Result<Option<TicketDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, DetailRow>(&format!("{} WHERE t.id = $1", detail_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &TicketFilter,
        page: PageRequest,
    ) -> Result<Page<TicketDetail>, RepositoryError> {
        let mut total = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {DETAIL_FROM}"));
        push_filters(&mut total, filter);
        let total: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(detail_select());
        push_filters(&mut qb, filter);
        push_page(&mut qb, "t.created_at DESC, t.id DESC", page);
        let rows: Vec<DetailRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            count(total),
        ))
    }

    async fn stats(&self, filter: &TicketFilter) -> Result<TicketStats, RepositoryError> {
        let rows: Vec<(TicketStatus, TicketCategory, i64)> = sqlx::query_as(
            "SELECT status, category, COUNT(*) FROM support_tickets \
             WHERE ($1::INTEGER IS NULL OR client_id = $1) GROUP BY status, category",
        )
        .bind(filter.client_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = TicketStats::default();
        for (status, category, n) in rows {
            stats.total += count(n);
            *stats.by_status.entry(status).or_default() += count(n);
            *stats.by_category.entry(category).or_default() += count(n);
        }
        Ok(stats)
    }

    async fn update(
        &self,
        id: TicketId,
        changes: TicketChanges,
    ) -> Result<SupportTicket, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "UPDATE support_tickets AS t SET \
             status = COALESCE($2, t.status), \
             priority = COALESCE($3, t.priority), \
             resolved_at = CASE \
                 WHEN $2 IS NULL OR $2 = 'CLOSED'::ticket_status THEN t.resolved_at \
                 WHEN $2 = 'RESOLVED'::ticket_status THEN COALESCE(t.resolved_at, NOW()) \
                 ELSE NULL END, \
             updated_at = NOW() \
             WHERE t.id = $1 RETURNING {TICKET_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.status)
        .bind(changes.priority)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn resolve(
        &self,
        id: TicketId,
        resolution: Option<String>,
    ) -> Result<SupportTicket, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets t WHERE t.id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        match current.status {
            TicketStatus::Resolved => return Ok(current.into()),
            TicketStatus::Closed => {
                return Err(RepositoryError::InvalidState(
                    "A closed ticket cannot be resolved".to_owned(),
                ));
            }
            TicketStatus::Open | TicketStatus::InProgress => {}
        }

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "UPDATE support_tickets AS t SET status = 'RESOLVED', resolution = $2, \
             resolved_at = NOW(), updated_at = NOW() WHERE t.id = $1 RETURNING {TICKET_COLUMNS}"
        ))
        .bind(id)
        .bind(resolution)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete(&self, id: TicketId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM support_tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
