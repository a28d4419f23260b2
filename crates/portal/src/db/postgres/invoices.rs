use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use warehub_core::{InvoiceId, InvoiceStatus, Page, PageRequest, SpaceId, UserId};

use super::{PgDatabase, conflict_on_unique, missing_on_foreign_key, push_page, push_search};
use crate::db::{InvoiceRepository, RepositoryError, count};
use crate::models::{Invoice, InvoiceDetail, InvoiceFilter, InvoiceStats, NewInvoice};

const INVOICE_COLUMNS: &str = "i.id, i.number, i.client_id, i.space_id, i.amount, i.tax, \
                               i.total_amount, i.status, i.issue_date, i.due_date, i.paid_at, \
                               i.attachment_url, i.notes, i.created_at, i.updated_at";

const DETAIL_FROM: &str = "FROM invoices i \
                           JOIN users u ON u.id = i.client_id \
                           JOIN spaces s ON s.id = i.space_id";

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: InvoiceId,
    number: String,
    client_id: UserId,
    space_id: SpaceId,
    amount: Decimal,
    tax: Decimal,
    total_amount: Decimal,
    status: InvoiceStatus,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    paid_at: Option<DateTime<Utc>>,
    attachment_url: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            number: row.number,
            client_id: row.client_id,
            space_id: row.space_id,
            amount: row.amount,
            tax: row.tax,
            total_amount: row.total_amount,
            status: row.status,
            issue_date: row.issue_date,
            due_date: row.due_date,
            paid_at: row.paid_at,
            attachment_url: row.attachment_url,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DetailRow {
    #[sqlx(flatten)]
    invoice: InvoiceRow,
    client_name: String,
    space_code: String,
}

impl From<DetailRow> for InvoiceDetail {
    fn from(row: DetailRow) -> Self {
        Self {
            invoice: row.invoice.into(),
            client_name: row.client_name,
            space_code: row.space_code,
        }
    }
}

fn detail_select() -> String {
    format!("SELECT {INVOICE_COLUMNS}, u.name AS client_name, s.code AS space_code {DETAIL_FROM}")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ").push_bind(status);
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND i.client_id = ").push_bind(client_id);
    }
    push_search(qb, filter.search.as_deref(), &["i.number", "u.name"]);
}

#[async_trait]
impl InvoiceRepository for PgDatabase {
    async fn create(&self, invoice: NewInvoice) -> Result<Invoice, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "INSERT INTO invoices AS i (number, client_id, space_id, amount, tax, total_amount, \
             status, issue_date, due_date, paid_at, attachment_url, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, \
             CASE WHEN $7 = 'PAID'::invoice_status THEN NOW() END, $10, $11) \
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(&invoice.number)
        .bind(invoice.client_id)
        .bind(invoice.space_id)
        .bind(invoice.amount)
        .bind(invoice.tax)
        .bind(invoice.total_amount())
        .bind(invoice.status)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(&invoice.attachment_url)
        .bind(&invoice.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match conflict_on_unique(e, "number") {
            RepositoryError::Database(e) => missing_on_foreign_key(e),
            other => other,
        })?;

        Ok(row.into())
    }

    async fn get(&self, id: InvoiceId) -> Result<Option<InvoiceDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, DetailRow>(&format!("{} WHERE i.id = $1", detail_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> Result<Page<InvoiceDetail>, RepositoryError> {
        let mut total = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {DETAIL_FROM}"));
        push_filters(&mut total, filter);
        let total: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(detail_select());
        push_filters(&mut qb, filter);
        push_page(&mut qb, "i.created_at DESC, i.id DESC", page);
        let rows: Vec<DetailRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            count(total),
        ))
    }

    async fn stats(&self, filter: &InvoiceFilter) -> Result<InvoiceStats, RepositoryError> {
        let rows: Vec<(InvoiceStatus, i64, Option<Decimal>)> = sqlx::query_as(
            "SELECT status, COUNT(*), SUM(total_amount) FROM invoices \
             WHERE ($1::INTEGER IS NULL OR client_id = $1) GROUP BY status",
        )
        .bind(filter.client_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = InvoiceStats::default();
        for (status, n, sum) in rows {
            stats.total += count(n);
            stats.by_status.insert(status, count(n));
            let sum = sum.unwrap_or_default();
            if status == InvoiceStatus::Paid {
                stats.paid_amount += sum;
            } else {
                stats.outstanding_amount += sum;
            }
        }
        Ok(stats)
    }

    async fn set_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "UPDATE invoices AS i SET status = $2, \
             paid_at = CASE WHEN $2 = 'PAID'::invoice_status THEN COALESCE(i.paid_at, NOW()) END, \
             updated_at = NOW() WHERE i.id = $1 RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
