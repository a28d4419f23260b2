use async_trait::async_trait;
use rust_decimal::Decimal;

use warehub_core::WarehouseId;

use super::PgDatabase;
use crate::db::{AnalyticsRepository, RepositoryError, count};
use crate::models::{BusinessTypeCount, DashboardOverview, MonthlyRevenue, WarehouseOccupancy};

#[async_trait]
impl AnalyticsRepository for PgDatabase {
    async fn revenue_by_month(&self, months: u32) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        let span = i32::try_from(months.saturating_sub(1)).unwrap_or(i32::MAX);
        let rows: Vec<(String, Decimal, i64)> = sqlx::query_as(
            "SELECT to_char(date_trunc('month', paid_at), 'YYYY-MM') AS month, \
                    SUM(total_amount), COUNT(*) \
             FROM invoices \
             WHERE status = 'PAID' AND paid_at IS NOT NULL \
               AND paid_at >= date_trunc('month', NOW()) - make_interval(months => $1) \
             GROUP BY 1 ORDER BY 1",
        )
        .bind(span)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(month, total, n)| MonthlyRevenue {
                month,
                total,
                invoice_count: count(n),
            })
            .collect())
    }

    async fn occupancy(&self) -> Result<Vec<WarehouseOccupancy>, RepositoryError> {
        let rows: Vec<(WarehouseId, String, i64, i64)> = sqlx::query_as(
            "SELECT w.id, w.name, COUNT(s.id), \
                    COUNT(s.id) FILTER (WHERE s.status = 'OCCUPIED') \
             FROM warehouses w LEFT JOIN spaces s ON s.warehouse_id = w.id \
             GROUP BY w.id, w.name ORDER BY w.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, total, occupied)| {
                WarehouseOccupancy::new(id, name, count(total), count(occupied))
            })
            .collect())
    }

    async fn clients_by_business_type(&self) -> Result<Vec<BusinessTypeCount>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(NULLIF(business_type, ''), 'Unspecified') AS business_type, COUNT(*) \
             FROM users WHERE role = 'CUSTOMER' \
             GROUP BY 1 ORDER BY 2 DESC, 1",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(business_type, n)| BusinessTypeCount {
                business_type,
                clients: count(n),
            })
            .collect())
    }

    async fn overview(&self) -> Result<DashboardOverview, RepositoryError> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT \
                (SELECT COUNT(*) FROM warehouses), \
                (SELECT COUNT(*) FROM spaces), \
                (SELECT COUNT(*) FROM spaces WHERE status = 'AVAILABLE'), \
                (SELECT COUNT(*) FROM users WHERE role = 'CUSTOMER'), \
                (SELECT COUNT(*) FROM users WHERE role = 'CUSTOMER' AND status = 'PENDING'), \
                (SELECT COUNT(*) FROM agreements WHERE status = 'ACTIVE'), \
                (SELECT COUNT(*) FROM support_tickets WHERE status IN ('OPEN', 'IN_PROGRESS')), \
                (SELECT COUNT(*) FROM invoices WHERE status <> 'PAID'), \
                (SELECT COUNT(*) FROM space_requests WHERE status = 'PENDING')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardOverview {
            warehouses: count(row.0),
            spaces: count(row.1),
            available_spaces: count(row.2),
            clients: count(row.3),
            pending_clients: count(row.4),
            active_agreements: count(row.5),
            open_tickets: count(row.6),
            pending_invoices: count(row.7),
            pending_space_requests: count(row.8),
        })
    }
}
