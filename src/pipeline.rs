//! Upload pipeline: remote removal, data URL decode, local compositing

use crate::catalog::BackgroundCatalog;
use crate::compositor;
use crate::data_url::DataUrl;
use crate::error::Result;
use crate::removal::BackgroundRemover;
use crate::types::{BackgroundEntry, SourceImage};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Runs one (image, background) pair end to end
///
/// Each step is a failure boundary; the first failure aborts the pair and no
/// partial output is produced.
#[derive(Clone)]
pub struct UploadPipeline {
    remover: Arc<dyn BackgroundRemover>,
    catalog: BackgroundCatalog,
}

impl UploadPipeline {
    pub fn new(remover: Arc<dyn BackgroundRemover>, catalog: BackgroundCatalog) -> Self {
        Self { remover, catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &BackgroundCatalog {
        &self.catalog
    }

    /// Remove the background, then composite onto `background`
    ///
    /// # Errors
    /// - `Validation` / `RemoteService` from the removal step
    /// - `Composition` when the returned data URL cannot be decoded
    /// - `BackgroundNotFound` when `background` is no longer in the catalog
    /// - `Composition` from the compositing step
    #[instrument(skip(self, image), fields(file = %image.file_name(), background = %background))]
    pub async fn process(&self, image: &SourceImage, background: &BackgroundEntry) -> Result<String> {
        let subject_url = self.remover.remove_background(image).await?;

        let subject = DataUrl::parse(&subject_url)?;
        debug!(
            media_type = %subject.media_type,
            bytes = subject.data.len(),
            "Decoded processed subject"
        );

        // Only names present in a fresh listing reach the filesystem
        let background = self.catalog.lookup(background.name()).await?;
        let background_path = self.catalog.resolve(&background);
        let composed = compositor::compose_file(subject.data, &background_path).await?;

        info!("Image processing complete");
        Ok(composed)
    }

    /// Only strip the background; no compositing
    pub async fn remove_only(&self, image: &SourceImage) -> Result<String> {
        self.remover.remove_background(image).await
    }
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
