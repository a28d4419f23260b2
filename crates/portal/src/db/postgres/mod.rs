//! `PostgreSQL` storage backend.
//!
//! Queries are built at runtime with `sqlx::query_as` and
//! [`QueryBuilder`] so the crate builds without a live database.
//! Multi-row rules take row locks with `SELECT ... FOR UPDATE` inside a
//! transaction.

mod agreements;
mod analytics;
mod invoices;
mod space_requests;
mod spaces;
mod tickets;
mod users;
mod warehouses;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use warehub_core::PageRequest;

use super::{
    AgreementRepository, AnalyticsRepository, Database, InvoiceRepository, RepositoryError,
    SpaceRepository, SpaceRequestRepository, TicketRepository, UserRepository,
    WarehouseRepository,
};

/// Storage backend over a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for migrations.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
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
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique violation to `Conflict(field)`, passing other errors through.
fn conflict_on_unique(e: sqlx::Error, field: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(field.to_owned());
    }
    RepositoryError::Database(e)
}

/// Map a foreign key violation to `NotFound`.
fn missing_on_foreign_key(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

/// Append `AND (col1 ILIKE $n OR col2 ILIKE $n ...)` for a non-empty search term.
fn push_search(qb: &mut QueryBuilder<'_, Postgres>, term: Option<&str>, columns: &[&str]) {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return;
    };
    let pattern = format!("%{}%", escape_like(term));
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
    }
    qb.push(")");
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Append `ORDER BY ... LIMIT ... OFFSET ...`.
fn push_page(qb: &mut QueryBuilder<'_, Postgres>, order_by: &str, page: PageRequest) {
    qb.push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(i64::try_from(page.limit()).unwrap_or(i64::MAX))
        .push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_push_search_skips_blank_terms() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 WHERE TRUE");
        push_search(&mut qb, Some("   "), &["name"]);
        assert_eq!(qb.sql(), "SELECT 1 WHERE TRUE");
    }

    #[test]
    fn test_push_search_ors_columns() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 WHERE TRUE");
        push_search(&mut qb, Some("acme"), &["name", "email"]);
        assert_eq!(
            qb.sql(),
            "SELECT 1 WHERE TRUE AND (name ILIKE $1 OR email ILIKE $2)"
        );
    }
}
