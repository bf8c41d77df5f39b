//! Morph Canvas CLI Tool
//!
//! Composites a product photo over every preset background using the
//! morph-canvas library and a remote background removal backend.

#[cfg(feature = "cli")]
use morph_canvas::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
