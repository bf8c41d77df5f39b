//! Handlers for `/api/upload`, `/api/background-count` and `/api/test-bg-removal`

use super::responses::{ApiResponse, ErrorBody, RemovalTestBody, UploadSuccess};
use crate::catalog::CatalogSource;
use crate::config::ServiceConfig;
use crate::pipeline::UploadPipeline;
use crate::types::{BackgroundEntry, SourceImage};
use tracing::{error, info, instrument};

/// Parsed multipart fields of `POST /api/upload`
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    /// `image`
    pub image: Option<SourceImage>,
    /// `projectType`; informational only
    pub project_type: Option<String>,
    /// `backgroundChoice`
    pub background_choice: Option<String>,
}

/// Parsed multipart fields of `POST /api/test-bg-removal`
#[derive(Debug, Clone, Default)]
pub struct RemovalTestForm {
    pub image: Option<SourceImage>,
    /// `method`; informational only
    pub method: Option<String>,
}

/// Endpoint handlers over one pipeline
#[derive(Debug, Clone)]
pub struct ApiHandlers {
    config: ServiceConfig,
    pipeline: UploadPipeline,
}

impl ApiHandlers {
    pub fn new(config: ServiceConfig, pipeline: UploadPipeline) -> Self {
        Self { config, pipeline }
    }

    #[must_use]
    pub fn pipeline(&self) -> &UploadPipeline {
        &self.pipeline
    }

    /// `GET /api/background-count`
    #[instrument(skip(self))]
    pub async fn background_count(&self) -> ApiResponse {
        match self.pipeline.catalog().fetch().await {
            Ok(listing) => ApiResponse::json(200, &listing),
            Err(e) => {
                error!(error = %e, "Error fetching background count");
                ApiResponse::json(500, &ErrorBody::new("Failed to fetch background count"))
            },
        }
    }

    /// `POST /api/upload`
    #[instrument(skip(self, form), fields(background = form.background_choice.as_deref().unwrap_or_default()))]
    pub async fn upload(&self, form: UploadForm) -> ApiResponse {
        let Some(image) = form.image.filter(|image| !image.is_empty()) else {
            return ApiResponse::json(400, &ErrorBody::new("No file uploaded"));
        };

        let project_type = form
            .project_type
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.config.default_project_type.clone());
        let choice = form
            .background_choice
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.config.default_background.clone());

        let background = match BackgroundEntry::new(&choice) {
            Ok(background) => background,
            Err(e) => {
                return ApiResponse::json(
                    e.status_code(),
                    &ErrorBody::new("Invalid background choice").with_details(e.to_string()),
                )
            },
        };

        info!(project_type = %project_type, "Processing upload");
        match self.pipeline.process(&image, &background).await {
            Ok(url) => ApiResponse::json(
                200,
                &UploadSuccess {
                    processed_image_url: url,
                },
            ),
            Err(e) => {
                error!(error = %e, "Image processing failed");
                ApiResponse::json(
                    e.status_code(),
                    &ErrorBody::new("Image processing failed").with_details(e.to_string()),
                )
            },
        }
    }

    /// `POST /api/test-bg-removal`; removal only, no compositing
    #[instrument(skip(self, form))]
    pub async fn test_removal(&self, form: RemovalTestForm) -> ApiResponse {
        let method = form
            .method
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "robust".to_string());

        let Some(image) = form.image.filter(|image| !image.is_empty()) else {
            return ApiResponse::json(400, &ErrorBody::new("No file uploaded"));
        };

        info!(method = %method, "Delegating background removal to backend");
        match self.pipeline.remove_only(&image).await {
            Ok(url) => ApiResponse::json(
                200,
                &RemovalTestBody {
                    processed_image_url: Some(url),
                    error: None,
                    details: None,
                    method,
                    success: true,
                },
            ),
            Err(e) => {
                error!(method = %method, error = %e, "Background removal failed");
                ApiResponse::json(
                    e.status_code(),
                    &RemovalTestBody {
                        processed_image_url: None,
                        error: Some("Background removal failed".to_string()),
                        details: Some(e.to_string()),
                        method,
                        success: false,
                    },
                )
            },
        }
    }
}
