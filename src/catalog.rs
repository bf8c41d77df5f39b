//! Background catalog backed by a directory of preset images

use crate::config::ServiceConfig;
use crate::error::{MorphError, Result};
use crate::types::{BackgroundEntry, CatalogListing};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

/// Anything that can produce the current background listing
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the current listing
    ///
    /// # Errors
    /// Listing failures surface as `MorphError::Catalog`
    async fn fetch(&self) -> Result<CatalogListing>;
}

/// Directory-backed catalog
#[derive(Debug, Clone)]
pub struct BackgroundCatalog {
    dir: PathBuf,
    extension: String,
}

impl BackgroundCatalog {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(dir: P, extension: S) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.images_dir, &config.background_extension)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List the directory, keeping `*.<extension>` entries, sorted by name
    ///
    /// The suffix match is case-sensitive and non-recursive.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn list(&self) -> Result<CatalogListing> {
        let suffix = format!(".{}", self.extension);
        let mut backgrounds = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let io_error = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                MorphError::catalog_error(&self.dir, &io_error)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if !name.ends_with(&suffix) {
                continue;
            }

            match BackgroundEntry::new(name) {
                Ok(background) => backgrounds.push(background),
                Err(e) => debug!(name = %name, error = %e, "Skipping unusable background name"),
            }
        }

        debug!(count = backgrounds.len(), "Listed backgrounds");
        Ok(CatalogListing::new(backgrounds))
    }

    /// Path of a background inside the catalog directory
    #[must_use]
    pub fn resolve(&self, entry: &BackgroundEntry) -> PathBuf {
        self.dir.join(entry.name())
    }

    /// Turn a user-supplied background name into a catalog entry
    ///
    /// The name must be a plain file name and must appear in a fresh listing;
    /// nothing outside the listing is ever touched on disk.
    ///
    /// # Errors
    /// - `Validation` for names that are not plain file names
    /// - `BackgroundNotFound` for names absent from the listing
    /// - `Catalog` when the directory cannot be listed
    pub async fn lookup(&self, name: &str) -> Result<BackgroundEntry> {
        let entry = BackgroundEntry::new(name)?;
        let listing = self.fetch().await?;
        if listing.contains(entry.name()) {
            Ok(entry)
        } else {
            Err(MorphError::BackgroundNotFound(self.resolve(&entry)))
        }
    }
}

#[async_trait]
impl CatalogSource for BackgroundCatalog {
    async fn fetch(&self) -> Result<CatalogListing> {
        let catalog = self.clone();
        tokio::task::spawn_blocking(move || catalog.list())
            .await
            .map_err(|e| MorphError::Catalog(format!("listing task failed: {}", e)))?
    }
}
