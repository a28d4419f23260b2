//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! wh-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PORTAL_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/portal/migrations/` and are embedded at build
//! time.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    MissingEnvVar(#[from] super::MissingEnvVar),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the portal database migrations.
pub async fn run() -> Result<(), MigrationError> {
    let url = super::database_url()?;
    tracing::info!("Connecting to portal database...");
    let pool = warehub_portal::db::create_pool(&url).await?;

    tracing::info!("Running portal migrations...");
    sqlx::migrate!("../portal/migrations").run(&pool).await?;

    tracing::info!("Portal migrations complete!");
    Ok(())
}
