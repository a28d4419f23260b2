//! Collaborators used by actions.
//!
//! - [`auth`] - Password hashing and session tokens
//! - [`email`] - Outbound email (SMTP or log)
//! - [`uploads`] - Attachment uploads to the file host
//! - [`view_cache`] - Listing cache with per-view invalidation

pub mod auth;
pub mod email;
pub mod uploads;
pub mod view_cache;

pub use auth::{AuthError, AuthService, SessionKeys};
pub use email::{DeliveryReceipt, EmailError, LogMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use uploads::{DisabledFileHost, FileHost, HttpFileHost, UploadProfile, UploadedFile};
pub use view_cache::{View, ViewCache};
