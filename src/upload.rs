//! Client side of the endpoint surface, as consumed by the batch orchestrator
//!
//! [`LocalUploadService`] calls the upload handler in-process;
//! [`HttpUploadService`] and [`HttpCatalogSource`] talk to a deployed front end.

use crate::api::{interpret_upload_response, ApiHandlers, UploadForm};
use crate::catalog::CatalogSource;
use crate::error::{MorphError, Result};
use crate::removal::image_part;
use crate::types::{BackgroundEntry, CatalogListing, SourceImage};
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-item outcome: the composed data URL, or the message to show
pub type UploadOutcome = std::result::Result<String, String>;

/// One upload of one image against one background
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(&self, image: &SourceImage, background: &BackgroundEntry) -> UploadOutcome;
}

/// Calls [`ApiHandlers::upload`] directly
#[derive(Debug, Clone)]
pub struct LocalUploadService {
    handlers: ApiHandlers,
    project_type: String,
}

impl LocalUploadService {
    pub fn new<S: Into<String>>(handlers: ApiHandlers, project_type: S) -> Self {
        Self {
            handlers,
            project_type: project_type.into(),
        }
    }
}

#[async_trait]
impl UploadService for LocalUploadService {
    async fn upload(&self, image: &SourceImage, background: &BackgroundEntry) -> UploadOutcome {
        let form = UploadForm {
            image: Some(image.clone()),
            project_type: Some(self.project_type.clone()),
            background_choice: Some(background.name().to_string()),
        };
        let response = self.handlers.upload(form).await;
        interpret_upload_response(response.status, &response.body)
    }
}

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MorphError::invalid_config(format!("Failed to create HTTP client: {}", e)))
}

/// POSTs multipart uploads to `{api_url}/api/upload`
#[derive(Debug, Clone)]
pub struct HttpUploadService {
    client: Client,
    api_url: String,
    project_type: String,
}

impl HttpUploadService {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new<S: Into<String>>(api_url: &str, project_type: S, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            project_type: project_type.into(),
        })
    }
}

#[async_trait]
impl UploadService for HttpUploadService {
    async fn upload(&self, image: &SourceImage, background: &BackgroundEntry) -> UploadOutcome {
        let form = Form::new()
            .part("image", image_part(image))
            .text("projectType", self.project_type.clone())
            .text("backgroundChoice", background.name().to_string());

        let response = self
            .client
            .post(format!("{}/api/upload", self.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        debug!(status, background = %background, "Upload answered");
        interpret_upload_response(status, &body)
    }
}

#[derive(Debug, Deserialize)]
struct RemoteListing {
    #[serde(default)]
    backgrounds: Option<Vec<String>>,
}

/// Reads `{api_url}/api/background-count`
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: Client,
    api_url: String,
    project_type: String,
}

impl HttpCatalogSource {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new<S: Into<String>>(api_url: &str, project_type: S, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            project_type: project_type.into(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<CatalogListing> {
        let response = self
            .client
            .get(format!("{}/api/background-count", self.api_url))
            .query(&[("projectType", self.project_type.as_str())])
            .send()
            .await
            .map_err(|e| MorphError::Catalog(format!("Failed to fetch backgrounds: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MorphError::Catalog(format!("Failed to fetch backgrounds: {}", e)))?;
        if !status.is_success() {
            return Err(MorphError::Catalog(format!(
                "Failed to fetch backgrounds: {} - {}",
                status.as_u16(),
                text
            )));
        }

        let listing: RemoteListing = serde_json::from_str(&text)
            .map_err(|e| MorphError::Catalog(format!("Unreadable background listing: {}", e)))?;

        let backgrounds = listing
            .backgrounds
            .unwrap_or_default()
            .into_iter()
            .filter_map(|name| match BackgroundEntry::new(&name) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(name = %name, error = %e, "Ignoring unusable background name");
                    None
                },
            })
            .collect();
        Ok(CatalogListing::new(backgrounds))
    }
}
