//! Background replacement CLI tool
//!
//! Runs one photo against every background of the catalog and writes the
//! composed images to disk.

use super::config::CliConfigBuilder;
use crate::{
    api::RemovalTestForm,
    batch::{BatchOrchestrator, BatchRun, BatchState, ResultStatus},
    catalog::CatalogSource,
    config::{ServiceConfig, BACKEND_URL_ENV, IMAGES_DIR_ENV},
    data_url::DataUrl,
    error::MorphError,
    handlers_from_config,
    removal::RemovalClient,
    tracing_config::{events, spans, TracingConfig, TracingFormat, TracingGuard},
    types::{BackgroundEntry, CatalogListing, SourceImage},
    upload::{HttpCatalogSource, HttpUploadService, LocalUploadService, UploadService},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Background replacement CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "morph-canvas")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Photo to composite over the backgrounds
    #[arg(value_name = "PHOTO", required_unless_present_any = ["list_backgrounds", "check_backend"])]
    pub input: Option<PathBuf>,

    /// Output directory [default: next to the photo]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Only use these backgrounds (repeatable)
    #[arg(short = 'b', long = "background", value_name = "NAME")]
    pub backgrounds: Vec<String>,

    /// Only use backgrounds whose name matches this glob (e.g., "studio-*.png")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Use a deployed front end's /api endpoints instead of the in-process pipeline
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Only strip the background and write <stem>_bg_removed.png
    #[arg(long)]
    pub remove_only: bool,

    /// Print the background listing and exit
    #[arg(long)]
    pub list_backgrounds: bool,

    /// Probe the removal backend's /health endpoint and exit
    #[arg(long)]
    pub check_backend: bool,

    /// Base URL of the background removal backend
    #[arg(long, value_name = "URL", env = BACKEND_URL_ENV)]
    pub backend_url: Option<String>,

    /// Directory holding the background images
    #[arg(long, value_name = "PATH", env = IMAGES_DIR_ENV)]
    pub images_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Project type sent with each upload
    #[arg(long, default_value = "base")]
    pub project_type: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = uuid::Uuid::new_v4().to_string();
    let _guard = init_tracing(&cli, &session_id).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli)?;

    let span = spans::session(&session_id, config.backend_base());
    run(&cli, &config).instrument(span).await
}

async fn run(cli: &Cli, config: &ServiceConfig) -> Result<()> {
    if cli.check_backend {
        return check_backend(config).await;
    }

    if cli.list_backgrounds {
        return list_backgrounds(cli, config).await;
    }

    let input = cli.input.as_deref().context("A photo is required")?;
    let image = SourceImage::from_path(input)
        .await
        .with_context(|| format!("Failed to read photo: {}", input.display()))?;
    let output_dir = prepare_output_dir(cli.output.as_deref(), input)?;

    if cli.remove_only {
        return remove_only(config, image, input, &output_dir).await;
    }

    run_batch(cli, config, image, input, &output_dir).await
}

/// Initialize tracing based on verbosity level and format
fn init_tracing(cli: &Cli, session_id: &str) -> Result<TracingGuard> {
    let format = match cli.log_format {
        CliLogFormat::Console => TracingFormat::Console,
        CliLogFormat::Compact => TracingFormat::Compact,
        #[cfg(feature = "tracing-json")]
        CliLogFormat::Json => TracingFormat::Json,
    };

    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .with_session_id(session_id);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        if !filter.trim().is_empty() {
            config = config.with_env_filter(filter);
        }
    }

    let guard = config.init()?;
    debug!(verbosity = cli.verbose, "Tracing initialized");
    Ok(guard)
}

async fn check_backend(config: &ServiceConfig) -> Result<()> {
    let client = RemovalClient::new(config)?;
    if client.health().await? {
        println!("Backend at {} is healthy", client.base_url());
        Ok(())
    } else {
        anyhow::bail!("Backend at {} did not report status ok", client.base_url())
    }
}

async fn list_backgrounds(cli: &Cli, config: &ServiceConfig) -> Result<()> {
    let body = match &cli.api_url {
        Some(api_url) => {
            let source = HttpCatalogSource::new(api_url, &cli.project_type, config.request_timeout())?;
            let listing = source.fetch().await?;
            serde_json::to_value(&listing)?
        },
        None => {
            let response = handlers_from_config(config)?.background_count().await;
            if !response.is_success() {
                anyhow::bail!(
                    "Failed to list backgrounds in {}: {}",
                    config.images_dir.display(),
                    response.body
                );
            }
            response.body
        },
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn remove_only(
    config: &ServiceConfig,
    image: SourceImage,
    input: &Path,
    output_dir: &Path,
) -> Result<()> {
    let handlers = handlers_from_config(config)?;
    let response = handlers
        .test_removal(RemovalTestForm {
            image: Some(image),
            method: None,
        })
        .await;

    if !response.is_success() {
        let details = response.body["details"]
            .as_str()
            .or_else(|| response.body["error"].as_str())
            .unwrap_or("unknown error");
        anyhow::bail!("Background removal failed: {}", details);
    }

    let url = response.body["processedImageUrl"]
        .as_str()
        .context("Backend did not return processedImageUrl")?;
    let output_path = generate_output_path(input, output_dir);
    write_data_url(url, &output_path).await?;

    println!("Saved {}", output_path.display());
    Ok(())
}

async fn run_batch(
    cli: &Cli,
    config: &ServiceConfig,
    image: SourceImage,
    input: &Path,
    output_dir: &Path,
) -> Result<()> {
    let (uploads, source): (Arc<dyn UploadService>, Box<dyn CatalogSource>) = match &cli.api_url {
        Some(api_url) => {
            info!(api_url = %api_url, "Using remote upload endpoint");
            (
                Arc::new(HttpUploadService::new(
                    api_url,
                    &cli.project_type,
                    config.request_timeout(),
                )?),
                Box::new(HttpCatalogSource::new(
                    api_url,
                    &cli.project_type,
                    config.request_timeout(),
                )?),
            )
        },
        None => {
            let handlers = handlers_from_config(config)?;
            let catalog = handlers.pipeline().catalog().clone();
            (
                Arc::new(LocalUploadService::new(handlers, &cli.project_type)),
                Box::new(catalog),
            )
        },
    };

    let selection = SelectedCatalog {
        source,
        names: cli.backgrounds.clone(),
        pattern: cli.pattern.as_deref().map(glob::Pattern::new).transpose()?,
    };

    let orchestrator = BatchOrchestrator::new(uploads);
    orchestrator
        .load_catalog(&selection)
        .await
        .context("Failed to load background catalog")?;

    let batch_start = Instant::now();
    let mut updates = orchestrator.subscribe();
    let handle = orchestrator.start(image);
    let total = handle.len();
    if total == 0 {
        events::warning_with_recommendation(
            "No backgrounds to process",
            "check --images-dir, --background and --pattern",
        );
        handle.join().await;
        return Ok(());
    }

    let span = spans::batch_run(input, total);
    async {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Compositing {}", input.display()));

        let join = handle.join();
        tokio::pin!(join);
        loop {
            tokio::select! {
                () = &mut join => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let settled = updates.borrow_and_update().run.as_ref().map_or(0, BatchRun::settled_count);
                    pb.set_position(settled as u64);
                },
            }
        }
        pb.finish_and_clear();
        anyhow::Ok(())
    }
    .instrument(span)
    .await?;

    let state = orchestrator.snapshot();
    report(&state, output_dir, batch_start).await
}

/// Write every finished result and print the per-item outcome
async fn report(state: &BatchState, output_dir: &Path, batch_start: Instant) -> Result<()> {
    let Some(run) = &state.run else {
        return Ok(());
    };

    let mut done = 0;
    let mut failed = 0;
    for result in &run.results {
        match &result.status {
            ResultStatus::Done { url } => {
                let output_path = output_dir.join(download_name(&result.background));
                let span = spans::output_write(result.background.name(), &output_path);
                write_data_url(url, &output_path).instrument(span).await?;
                println!("✓ {} -> {}", result.background, output_path.display());
                done += 1;
            },
            ResultStatus::Error { message } => {
                eprintln!("✗ {}: {}", result.background, message);
                failed += 1;
            },
            ResultStatus::Processing => {
                eprintln!("… {}: still processing", result.background);
            },
        }
    }

    events::batch_summary(done, failed, batch_start.elapsed().as_millis() as u64);
    println!("Composited {} of {} backgrounds", done, run.results.len());

    if let Some(error) = &state.error {
        eprintln!("Error: {}", error);
    }
    if done == 0 && failed > 0 {
        anyhow::bail!("All {} backgrounds failed", failed);
    }
    Ok(())
}

/// Catalog narrowed to `--background` names and `--pattern`
struct SelectedCatalog {
    source: Box<dyn CatalogSource>,
    names: Vec<String>,
    pattern: Option<glob::Pattern>,
}

#[async_trait]
impl CatalogSource for SelectedCatalog {
    async fn fetch(&self) -> crate::error::Result<CatalogListing> {
        let listing = self.source.fetch().await?;

        let unknown: Vec<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .filter(|name| !listing.contains(name))
            .collect();
        if !unknown.is_empty() {
            return Err(MorphError::Catalog(format!(
                "unknown background(s): {}",
                unknown.join(", ")
            )));
        }

        let backgrounds = listing
            .backgrounds
            .into_iter()
            .filter(|entry| self.names.is_empty() || self.names.iter().any(|n| n == entry.name()))
            .filter(|entry| matches_pattern(entry, self.pattern.as_ref()))
            .collect();
        Ok(CatalogListing::new(backgrounds))
    }
}

fn matches_pattern(entry: &BackgroundEntry, pattern: Option<&glob::Pattern>) -> bool {
    pattern.map_or(true, |p| p.matches(entry.name()))
}

/// Resolve and create the output directory
fn prepare_output_dir(output: Option<&Path>, input: &Path) -> Result<PathBuf> {
    let dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf(),
    };

    if dir.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            dir.display()
        );
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir)
}

/// File name a composed result is saved under
fn download_name(background: &BackgroundEntry) -> String {
    let stem = Path::new(background.name())
        .file_stem()
        .map_or_else(|| background.name().into(), |s| s.to_string_lossy());
    format!("processed-{}.png", stem)
}

/// Output path for `--remove-only`
fn generate_output_path(input_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    output_dir.join(format!("{}_bg_removed.png", stem.to_string_lossy()))
}

async fn write_data_url(url: &str, path: &Path) -> Result<()> {
    let decoded = DataUrl::parse(url)?;
    tokio::fs::write(path, &decoded.data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    events::output_written(path, decoded.data.len());
    Ok(())
}
