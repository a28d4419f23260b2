//! Attachment uploads to an external file host.
//!
//! Invoice and support ticket attachments are pushed to a hosted file
//! service over HTTP. The portal only stores the returned URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::config::UploadConfig;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest attachment accepted from a form, in bytes.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// A file received from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Which upload preset a file is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProfile {
    Invoices,
    Support,
}

impl UploadProfile {
    #[must_use]
    pub const fn preset(self) -> &'static str {
        match self {
            Self::Invoices => "invoices",
            Self::Support => "support",
        }
    }
}

/// Stores attachments and hands back their public URL.
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Upload `file`. Returns `None` on any failure; the failure is logged.
    async fn upload(&self, file: UploadedFile, profile: UploadProfile) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

/// Uploads over HTTP as `multipart/form-data`.
pub struct HttpFileHost {
    client: reqwest::Client,
    url: Url,
    api_key: SecretString,
}

impl HttpFileHost {
    /// Create a file host client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &UploadConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn try_upload(
        &self,
        file: UploadedFile,
        profile: UploadProfile,
    ) -> Result<Option<String>, reqwest::Error> {
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        let form = Form::new()
            .text("upload_preset", profile.preset())
            .part("file", part);

        let response: UploadResponse = self
            .client
            .post(self.url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.secure_url.or(response.url))
    }
}

#[async_trait]
impl FileHost for HttpFileHost {
    #[tracing::instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    async fn upload(&self, file: UploadedFile, profile: UploadProfile) -> Option<String> {
        match self.try_upload(file, profile).await {
            Ok(Some(url)) => {
                tracing::info!(preset = profile.preset(), "Attachment uploaded");
                Some(url)
            }
            Ok(None) => {
                tracing::error!(preset = profile.preset(), "File host response had no URL");
                None
            }
            Err(e) => {
                tracing::error!(preset = profile.preset(), error = %e, "Attachment upload failed");
                None
            }
        }
    }
}

/// File host used when uploads are not configured. Every upload fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFileHost;

#[async_trait]
impl FileHost for DisabledFileHost {
    async fn upload(&self, file: UploadedFile, _profile: UploadProfile) -> Option<String> {
        tracing::warn!(file_name = %file.file_name, "Uploads are not configured, attachment dropped");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_map_to_presets() {
        assert_eq!(UploadProfile::Invoices.preset(), "invoices");
        assert_eq!(UploadProfile::Support.preset(), "support");
    }

    #[tokio::test]
    async fn test_disabled_host_never_returns_url() {
        let file = UploadedFile {
            file_name: "receipt.pdf".to_owned(),
            content_type: "application/pdf".to_owned(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(
            DisabledFileHost.upload(file, UploadProfile::Invoices).await,
            None
        );
    }
}
