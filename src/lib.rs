#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

//! # Morph Canvas
//!
//! Background replacement for product photos: a remote service strips the
//! background from an uploaded photo, the subject is composited over every
//! background of a local catalog, and the results are returned as PNG data
//! URLs.
//!
//! ## Features
//!
//! - **Remote Removal**: multipart client for a `/remove-background` backend
//! - **Compositing**: background stretched to the subject, source-over blend
//! - **Catalog**: flat directory of background images, validated by name
//! - **Batch Runs**: one concurrent upload per background, each settling on its own
//! - **Endpoint Handlers**: framework-agnostic `/api/*` handlers with JSON bodies
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use morph_canvas::{replace_background, ServiceConfig, SourceImage};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder()
//!     .backend_url("http://localhost:5000")
//!     .images_dir("public/images")
//!     .build()?;
//!
//! let photo = SourceImage::from_path("product.jpg").await?;
//! let state = replace_background(photo, &config).await?;
//! for result in &state.run.as_ref().map(|run| run.results.clone()).unwrap_or_default() {
//!     println!("{}: {:?}", result.background, result.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bars and tracing setup
//! - `webp-support` (default): WebP decoding for photos and backgrounds
//! - `tracing-json`, `tracing-files`: structured and file log output for the CLI

pub mod api;
pub mod batch;
pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod data_url;
pub mod error;
pub mod pipeline;
pub mod removal;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod upload;

use std::sync::Arc;

// Public API exports
pub use api::{ApiHandlers, ApiResponse, RemovalTestForm, UploadForm};
pub use batch::{BatchEvent, BatchOrchestrator, BatchState, ProcessedResult, ResultStatus, RunHandle, RunId};
pub use catalog::{BackgroundCatalog, CatalogSource};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use data_url::DataUrl;
pub use error::{MorphError, Result};
pub use pipeline::UploadPipeline;
pub use removal::{BackgroundRemover, RemovalClient};
pub use types::{BackgroundEntry, CatalogListing, SourceImage};
pub use upload::{HttpCatalogSource, HttpUploadService, LocalUploadService, UploadOutcome, UploadService};

#[cfg(feature = "cli")]
pub use tracing_config::{events, spans, TracingConfig, TracingFormat, TracingGuard, TracingOutput};

/// Wire the endpoint handlers for `config`
///
/// ```rust
/// # fn main() -> morph_canvas::Result<()> {
/// let config = morph_canvas::ServiceConfig::from_env()?;
/// let handlers = morph_canvas::handlers_from_config(&config)?;
/// assert_eq!(handlers.pipeline().catalog().dir(), config.images_dir.as_path());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - `InvalidConfig` when the config does not validate or the HTTP client cannot be built
pub fn handlers_from_config(config: &ServiceConfig) -> Result<ApiHandlers> {
    config.validate()?;
    let remover = Arc::new(RemovalClient::new(config)?);
    let pipeline = UploadPipeline::new(remover, BackgroundCatalog::from_config(config));
    Ok(ApiHandlers::new(config.clone(), pipeline))
}

/// Composite one photo over every background in the catalog
///
/// Runs in-process against the configured removal backend and returns the
/// settled batch state. Per-background failures are recorded in the state,
/// not returned.
///
/// # Errors
/// - Configuration errors
/// - `Catalog` when the background directory cannot be listed
pub async fn replace_background(image: SourceImage, config: &ServiceConfig) -> Result<BatchState> {
    let handlers = handlers_from_config(config)?;
    let catalog = handlers.pipeline().catalog().clone();
    let uploads = LocalUploadService::new(handlers, config.default_project_type.clone());

    let orchestrator = BatchOrchestrator::new(Arc::new(uploads));
    orchestrator.load_catalog(&catalog).await?;
    Ok(orchestrator.run(image).await)
}
