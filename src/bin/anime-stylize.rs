//! Anime stylization CLI tool
//!
//! Command-line interface for turning photos into anime-style images with
//! the anime-stylize library, using ONNX Runtime or Tract backends.

#[cfg(feature = "cli")]
use anime_stylize::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
