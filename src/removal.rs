//! Client for the remote background removal backend
//!
//! The backend exposes `POST /remove-background` (multipart field `image`)
//! answering `{"processedImageUrl": "data:image/png;base64,..."}`, and
//! `GET /health` answering `{"status": "ok"}`.

use crate::config::ServiceConfig;
use crate::error::{MorphError, Result};
use crate::types::{SourceImage, DEFAULT_MIME_TYPE};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Something that strips the background from an image
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Return the background-stripped image as a data URL
    ///
    /// # Errors
    /// - `Validation` for an empty image
    /// - `RemoteService` for any backend failure
    async fn remove_background(&self, image: &SourceImage) -> Result<String>;
}

/// Multipart `image` field; a declared type the encoder rejects is sent as PNG
pub(crate) fn image_part(image: &SourceImage) -> Part {
    let part = || Part::bytes(image.bytes().to_vec()).file_name(image.file_name().to_string());
    part().mime_str(image.mime_type()).unwrap_or_else(|e| {
        warn!(mime = %image.mime_type(), error = %e, "Unusable MIME type, sending as {}", DEFAULT_MIME_TYPE);
        part().mime_str(DEFAULT_MIME_TYPE).unwrap_or_else(|_| part())
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemovalResponse {
    processed_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// HTTP client for the removal backend
#[derive(Debug, Clone)]
pub struct RemovalClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl RemovalClient {
    /// Create a client for the configured backend
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MorphError::invalid_config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.backend_base().to_string(),
            timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health`
    ///
    /// Returns `Ok(false)` when the backend answers but is not healthy.
    ///
    /// # Errors
    /// - Backend unreachable or timed out
    #[instrument(skip(self), fields(backend = %self.base_url))]
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Backend health check failed");
            return Ok(false);
        }

        let healthy = response
            .json::<HealthResponse>()
            .await
            .map(|health| health.status.eq_ignore_ascii_case("ok"))
            .unwrap_or(false);
        debug!(healthy, "Backend health probed");
        Ok(healthy)
    }

    fn transport_error(&self, error: &reqwest::Error) -> MorphError {
        if error.is_timeout() {
            MorphError::remote_service(format!(
                "Backend background removal timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            MorphError::remote_service(format!("Backend background removal failed: {}", error))
        }
    }
}

#[async_trait]
impl BackgroundRemover for RemovalClient {
    #[instrument(skip(self, image), fields(file = %image.file_name(), bytes = image.bytes().len()))]
    async fn remove_background(&self, image: &SourceImage) -> Result<String> {
        if image.is_empty() {
            return Err(MorphError::validation("Empty file uploaded"));
        }

        let form = Form::new().part("image", image_part(image));

        info!("Delegating background removal to backend");
        let url = format!("{}/remove-background", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let data_url = interpret_removal_response(status, &body)?;
        debug!(len = data_url.len(), "Background removal delegated to backend successfully");
        Ok(data_url)
    }
}

/// Map a raw backend answer onto the processed data URL or a `RemoteService` error
pub fn interpret_removal_response(status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        return Err(MorphError::upstream_status(status, body));
    }

    let parsed: RemovalResponse = serde_json::from_str(body).map_err(|e| {
        MorphError::remote_service(format!("Backend returned an unreadable response: {}", e))
    })?;

    parsed
        .processed_image_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| MorphError::remote_service("Backend did not return processedImageUrl"))
}
