//! Seed the portal with demo warehouses and spaces.
//!
//! The seed file names an existing admin as the manager of every warehouse;
//! create one first with `wh-cli admin create`. Warehouses whose code already
//! exists are skipped together with their spaces, so the command can be
//! rerun safely.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use warehub_core::{Email, Role, SpaceStatus, StorageType, UserId};
use warehub_portal::db::postgres::PgDatabase;
use warehub_portal::db::{Database, RepositoryError};
use warehub_portal::models::{SpaceDraft, WarehouseDraft};

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub manager_email: String,
    pub warehouses: Vec<SeedWarehouse>,
}

#[derive(Debug, Deserialize)]
pub struct SeedWarehouse {
    pub code: String,
    pub name: String,
    pub location: String,
    pub storage_type: StorageType,
    pub capacity: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub spaces: Vec<SeedSpace>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSpace {
    pub code: String,
    pub name: String,
    pub space_type: String,
    pub size: Decimal,
    pub rate: Decimal,
}

/// Problems in a seed file, one message per entry.
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    if Email::parse(&seed.manager_email).is_err() {
        errors.push(format!("manager_email is not a valid email: {}", seed.manager_email));
    }
    for warehouse in &seed.warehouses {
        if warehouse.capacity < 0 {
            errors.push(format!("{}: capacity must not be negative", warehouse.code));
        }
        for space in &warehouse.spaces {
            if space.size <= Decimal::ZERO || space.rate < Decimal::ZERO {
                errors.push(format!(
                    "{}/{}: size must be positive and rate not negative",
                    warehouse.code, space.code
                ));
            }
        }
    }
    errors
}

async fn manager(db: &PgDatabase, email: &str) -> Result<UserId, Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let credentials = db
        .users()
        .find_credentials(&email)
        .await?
        .filter(|c| c.user.role == Role::Admin)
        .ok_or_else(|| format!("No admin account with email {email}"))?;
    Ok(credentials.user.id)
}

/// Load a seed file into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, the
/// manager does not exist, or a database write fails for a reason other
/// than an existing code.
pub async fn demo(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed data");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let db = PgDatabase::new(super::connect().await?);
    let manager_id = manager(&db, &seed.manager_email).await?;

    let (mut warehouses, mut spaces, mut skipped) = (0_u32, 0_u32, 0_u32);
    for entry in seed.warehouses {
        let created = db
            .warehouses()
            .create(WarehouseDraft {
                code: entry.code.clone(),
                name: entry.name,
                location: entry.location,
                storage_type: entry.storage_type,
                capacity: entry.capacity,
                manager_id,
                description: entry.description,
            })
            .await;
        let warehouse = match created {
            Ok(warehouse) => warehouse,
            Err(RepositoryError::Conflict(_)) => {
                warn!(code = %entry.code, "Warehouse already exists, skipping");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        warehouses += 1;

        for space in entry.spaces {
            db.spaces()
                .create(SpaceDraft {
                    warehouse_id: warehouse.id,
                    code: space.code,
                    name: space.name,
                    space_type: space.space_type,
                    size: space.size,
                    rate: space.rate,
                    status: Some(SpaceStatus::Available),
                })
                .await?;
            spaces += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Warehouses created: {warehouses}");
    info!("  Spaces created: {spaces}");
    info!("  Warehouses skipped (already exist): {skipped}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_seed_is_valid() {
        let seed: SeedFile = serde_yaml::from_str(include_str!("../../seed/demo.yaml"))
            .unwrap_or_else(|e| panic!("demo seed should parse: {e}"));
        assert!(validate(&seed).is_empty());
        assert!(seed.warehouses.iter().all(|w| !w.spaces.is_empty()));
    }

    #[test]
    fn test_negative_values_are_reported() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
manager_email: ops@warehub.test
warehouses:
  - code: WH-X
    name: Broken
    location: Nowhere
    storage_type: AMBIENT
    capacity: -1
    spaces:
      - code: X-1
        name: Bay
        space_type: Pallet bay
        size: "0"
        rate: "10"
"#,
        )
        .unwrap_or_else(|e| panic!("seed should parse: {e}"));
        assert_eq!(validate(&seed).len(), 2);
    }
}
