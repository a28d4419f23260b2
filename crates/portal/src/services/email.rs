//! Outbound email.
//!
//! Actions talk to a [`Mailer`]. With SMTP configured that is an
//! [`SmtpMailer`] over lettre; otherwise [`LogMailer`] writes the message to
//! the log so local development needs no mail server.

use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use warehub_core::Email;

use crate::config::EmailConfig;
use crate::models::{SpaceDetail, SpaceRequest};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTML body of the admin notification for a new space request.
#[derive(Template)]
#[template(path = "email/space_request.html")]
struct SpaceRequestEmailHtml<'a> {
    request: &'a SpaceRequest,
    space: &'a SpaceDetail,
}

/// Plain text body of the admin notification for a new space request.
#[derive(Template)]
#[template(path = "email/space_request.txt")]
struct SpaceRequestEmailText<'a> {
    request: &'a SpaceRequest,
    space: &'a SpaceDetail,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Email,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Proof of delivery to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Sends transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, EmailError>;
}

/// Render the admin notification for a freshly submitted space request.
///
/// # Errors
///
/// Returns `EmailError::Template` if a template fails to render.
pub fn space_request_notification(
    to: Email,
    request: &SpaceRequest,
    space: &SpaceDetail,
) -> Result<OutgoingEmail, EmailError> {
    Ok(OutgoingEmail {
        to,
        subject: format!(
            "New space request: {} ({})",
            space.space.code, space.warehouse_name
        ),
        text: SpaceRequestEmailText { request, space }.render()?,
        html: SpaceRequestEmailHtml { request, space }.render()?,
    })
}

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay address cannot be resolved into a transport.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, EmailError> {
        let message_id = format!("<{}@warehub>", Uuid::new_v4());

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.to_string()))?)
            .subject(&email.subject)
            .message_id(Some(message_id.clone()))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )?;

        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(DeliveryReceipt { message_id })
    }
}

/// Mailer used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, EmailError> {
        let message_id = format!("<{}@warehub.local>", Uuid::new_v4());
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            body = %email.text,
            "SMTP not configured, email logged instead of sent"
        );
        Ok(DeliveryReceipt { message_id })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use warehub_core::{SpaceId, SpaceRequestId, SpaceRequestStatus, SpaceStatus, WarehouseId};

    use super::*;
    use crate::models::Space;

    fn fixture() -> (SpaceRequest, SpaceDetail) {
        let now = Utc::now();
        let request = SpaceRequest {
            id: SpaceRequestId::new(1),
            space_id: SpaceId::new(3),
            name: "Acme <Logistics>".to_owned(),
            email: Email::parse("ops@acme.test").unwrap(),
            phone: None,
            company: Some("Acme".to_owned()),
            message: Some("Need it from March".to_owned()),
            status: SpaceRequestStatus::Pending,
            agreement_id: None,
            created_at: now,
            updated_at: now,
        };
        let space = SpaceDetail {
            space: Space {
                id: SpaceId::new(3),
                warehouse_id: WarehouseId::new(1),
                code: "A-101".to_owned(),
                name: "Bay 101".to_owned(),
                space_type: "Pallet bay".to_owned(),
                size: Decimal::new(500, 0),
                rate: Decimal::new(1200, 0),
                status: SpaceStatus::Reserved,
                created_at: now,
                updated_at: now,
            },
            warehouse_name: "North".to_owned(),
            warehouse_location: "Leeds".to_owned(),
        };
        (request, space)
    }

    #[test]
    fn test_notification_mentions_space_and_requester() {
        let (request, space) = fixture();
        let to = Email::parse("admin@warehub.test").unwrap();
        let email = space_request_notification(to.clone(), &request, &space).unwrap();

        assert_eq!(email.to, to);
        assert_eq!(email.subject, "New space request: A-101 (North)");
        assert!(email.text.contains("ops@acme.test"));
        assert!(email.text.contains("Need it from March"));
        assert!(!email.html.contains("<Logistics>"));
    }

    #[tokio::test]
    async fn test_log_mailer_returns_receipt() {
        let (request, space) = fixture();
        let email = space_request_notification(
            Email::parse("admin@warehub.test").unwrap(),
            &request,
            &space,
        )
        .unwrap();
        let receipt = LogMailer.send(email).await.unwrap();
        assert!(receipt.message_id.ends_with("@warehub.local>"));
    }
}
