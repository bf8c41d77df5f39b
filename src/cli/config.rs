//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::ServiceConfig;
use anyhow::{Context, Result};

/// Convert CLI arguments to a [`ServiceConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the service configuration; flags win over the environment
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .request_timeout_secs(cli.timeout)
            .default_project_type(cli.project_type.clone());

        if let Some(url) = &cli.backend_url {
            builder = builder.backend_url(url.clone());
        }
        if let Some(dir) = &cli.images_dir {
            builder = builder.images_dir(dir.clone());
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid background pattern: {}", pattern))?;
        }

        if let Some(api_url) = &cli.api_url {
            if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
                anyhow::bail!("Invalid API URL: {} (expected an http:// or https:// URL)", api_url);
            }
            if cli.remove_only {
                anyhow::bail!("--remove-only talks to the removal backend directly; drop --api-url");
            }
        }

        for name in &cli.backgrounds {
            crate::types::BackgroundEntry::new(name)
                .with_context(|| format!("Invalid --background value: {}", name))?;
        }

        Ok(())
    }
}
