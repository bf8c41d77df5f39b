//! Configuration types for the background replacement service

use crate::error::{MorphError, Result};
use crate::types::BackgroundEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the removal backend base URL
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

/// Environment variable overriding the background images directory
pub const IMAGES_DIR_ENV: &str = "MORPH_IMAGES_DIR";

/// Default removal backend base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Configuration shared by the catalog, removal client and upload handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the background removal backend
    pub backend_url: String,

    /// Directory holding the preset background images
    pub images_dir: PathBuf,

    /// File extension (without dot) a catalog entry must carry
    pub background_extension: String,

    /// Timeout applied to every outbound HTTP request, in seconds
    pub request_timeout_secs: u64,

    /// Background used when an upload names none
    pub default_background: String,

    /// Project type reported when an upload names none
    pub default_project_type: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            images_dir: PathBuf::from("public").join("images"),
            background_extension: "png".to_string(),
            request_timeout_secs: 60,
            default_background: "background1.png".to_string(),
            default_project_type: "base".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use morph_canvas::ServiceConfig;
    ///
    /// let config = ServiceConfig::builder()
    ///     .backend_url("http://127.0.0.1:5000")
    ///     .request_timeout_secs(30)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.request_timeout_secs, 30);
    /// ```
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Defaults overridden by `BACKEND_URL` and `MORPH_IMAGES_DIR` when set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            builder = builder.backend_url(url.trim());
        }
        if let Some(dir) = lookup(IMAGES_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            builder = builder.images_dir(dir.trim());
        }
        builder.build()
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Backend URL is not an absolute http(s) URL
    /// - Request timeout is zero
    /// - Background extension is empty or contains a dot or separator
    /// - Default background is not a plain file name
    pub fn validate(&self) -> Result<()> {
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MorphError::config_value_error(
                "backend URL",
                &self.backend_url,
                "an http:// or https:// URL",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(MorphError::config_value_error(
                "request timeout",
                self.request_timeout_secs,
                "at least 1 second",
            ));
        }

        let ext = &self.background_extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(MorphError::config_value_error(
                "background extension",
                ext,
                "a bare extension such as png",
            ));
        }

        BackgroundEntry::new(&self.default_background).map_err(|_| {
            MorphError::config_value_error(
                "default background",
                &self.default_background,
                "a plain file name",
            )
        })?;

        Ok(())
    }

    /// Backend URL without a trailing slash
    #[must_use]
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim().trim_end_matches('/')
    }
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Set the removal backend base URL
    #[must_use]
    pub fn backend_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.backend_url = url.into();
        self
    }

    /// Set the background images directory
    #[must_use]
    pub fn images_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    /// Set the catalog file extension
    #[must_use]
    pub fn background_extension<S: Into<String>>(mut self, ext: S) -> Self {
        self.config.background_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    /// Set the outbound request timeout
    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the fallback background
    #[must_use]
    pub fn default_background<S: Into<String>>(mut self, name: S) -> Self {
        self.config.default_background = name.into();
        self
    }

    /// Set the fallback project type
    #[must_use]
    pub fn default_project_type<S: Into<String>>(mut self, project_type: S) -> Self {
        self.config.default_project_type = project_type.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
