//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{PortalConfig, StoreBackend};
use crate::db::{Database, create_pool, memory::MemoryDatabase, postgres::PgDatabase};
use crate::services::{
    DisabledFileHost, FileHost, HttpFileHost, LogMailer, Mailer, SessionKeys, SmtpMailer,
    ViewCache,
};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("SMTP transport could not be built: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("upload client could not be built: {0}")]
    Uploads(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and gives handlers the store,
/// the outbound collaborators and the listing cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    db: Arc<dyn Database>,
    mailer: Arc<dyn Mailer>,
    files: Arc<dyn FileHost>,
    views: ViewCache,
    sessions: SessionKeys,
}

impl AppState {
    /// Create application state from already-built collaborators.
    ///
    /// # Arguments
    ///
    /// * `config` - Portal configuration
    /// * `db` - Storage backend
    /// * `mailer` - Outbound email
    /// * `files` - Attachment file host
    #[must_use]
    pub fn new(
        config: PortalConfig,
        db: Arc<dyn Database>,
        mailer: Arc<dyn Mailer>,
        files: Arc<dyn FileHost>,
    ) -> Self {
        let sessions = SessionKeys::new(&config.session_secret, config.session_ttl_hours);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                mailer,
                files,
                views: ViewCache::new(),
                sessions,
            }),
        }
    }

    /// Build the store and collaborators described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or a client cannot be
    /// constructed.
    pub async fn from_config(config: PortalConfig) -> Result<Self, StateError> {
        let db: Arc<dyn Database> = match &config.store {
            StoreBackend::Postgres(url) => Arc::new(PgDatabase::new(create_pool(url).await?)),
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, data is lost on restart");
                Arc::new(MemoryDatabase::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(SmtpMailer::new(email)?),
            None => {
                tracing::warn!("SMTP not configured, emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let files: Arc<dyn FileHost> = match &config.uploads {
            Some(uploads) => Arc::new(HttpFileHost::new(uploads)?),
            None => Arc::new(DisabledFileHost),
        };

        Ok(Self::new(config, db, mailer, files))
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get the storage backend.
    #[must_use]
    pub fn db(&self) -> &dyn Database {
        self.inner.db.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn files(&self) -> &dyn FileHost {
        self.inner.files.as_ref()
    }

    /// Get the listing cache.
    #[must_use]
    pub fn views(&self) -> &ViewCache {
        &self.inner.views
    }

    /// Get the session token keys.
    #[must_use]
    pub fn sessions(&self) -> &SessionKeys {
        &self.inner.sessions
    }
}
