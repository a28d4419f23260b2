//! Admin user management.
//!
//! # Usage
//!
//! ```bash
//! wh-cli admin create -e ops@example.com -n "Ops Team" -p "<password>"
//! ```
//!
//! # Environment Variables
//!
//! - `PORTAL_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use warehub_core::{Role, UserStatus};
use warehub_portal::db::postgres::PgDatabase;
use warehub_portal::db::Database;
use warehub_portal::models::BusinessProfile;
use warehub_portal::services::auth::NewAccount;
use warehub_portal::services::AuthService;

/// Create an active admin account.
///
/// # Returns
///
/// The ID of the created admin user.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
) -> Result<i32, Box<dyn std::error::Error>> {
    let db = PgDatabase::new(super::connect().await?);

    tracing::info!("Creating admin user: {}", email);

    let user = AuthService::new(db.users())
        .create_account(NewAccount {
            name: name.trim().to_owned(),
            email,
            password: Some(password),
            role: Role::Admin,
            status: UserStatus::Active,
            profile: BusinessProfile::default(),
        })
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id.as_i32())
}
