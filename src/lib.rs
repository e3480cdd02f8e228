#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Anime Stylize
//!
//! Photo-to-anime style transfer around pretrained AnimeGAN-style networks,
//! with ONNX Runtime and Tract backends.
//!
//! The network is an opaque ONNX graph. This crate supplies everything
//! around it: resizing photos into the layout the network expects, running
//! it, restoring the output at the original resolution, and batch
//! orchestration with per-item failure reporting.
//!
//! ## Features
//!
//! - **Image adapter**: downscale to a maximum edge, align to multiples of 32,
//!   normalize to `[-1, 1]`, restore with half-pixel bilinear resizing
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **Hardware Acceleration**: CUDA, `CoreML`, and CPU execution providers
//! - **Batch processing**: bounded worker pool, one session per worker over
//!   shared weights, skip-and-continue on failures
//! - **Atomic output**: results are staged in a private scratch directory
//!   and only moved into place when complete
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anime_stylize::{infer, ExecutionProvider, ImageInput, InferOutput};
//! use std::path::Path;
//!
//! let written = infer(
//!     Path::new("weights/face_paint_512_v2.onnx"),
//!     ImageInput::Path("portrait.jpg".into()),
//!     Some(Path::new("portrait_anime.png")),
//!     ExecutionProvider::Auto,
//!     false,
//! )?;
//! assert!(matches!(written, InferOutput::Written(_)));
//! # Ok::<(), anime_stylize::StylizeError>(())
//! ```
//!
//! ## Reusing a session
//!
//! [`StylizeProcessor`] keeps the weights and backend session alive across
//! images:
//!
//! ```rust,no_run
//! use anime_stylize::{BackendType, ProcessorConfig, StylizeProcessor};
//!
//! let config = ProcessorConfig::builder()
//!     .weights_path("weights/paprika.onnx")
//!     .backend_type(BackendType::Tract)
//!     .max_edge(768)
//!     .build()?;
//! let mut processor = StylizeProcessor::new(config)?;
//! for name in ["a.jpg", "b.jpg"] {
//!     processor.process_file_to_path(name, format!("anime_{name}"))?;
//! }
//! # Ok::<(), anime_stylize::StylizeError>(())
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface and progress reporting
//! - `webp-support` (default): WebP image format support
//! - `tracing-json`, `tracing-files`: structured and file log output for the CLI

pub mod adapter;
pub mod backends;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use adapter::ImageAdapter;
pub use backends::*;
pub use batch::{BatchItemFailure, BatchItemSuccess, BatchJob, BatchOutcome, BatchProcessor};
pub use config::{ExecutionProvider, OutputFormat, StylizeConfig, StylizeConfigBuilder};
pub use error::{ErrorKind, Result, StylizeError};
pub use inference::InferenceBackend;
pub use models::{format_size, CatalogEntry, ModelCatalog, ModelInfo, ModelWeights};
pub use processor::{
    BackendFactory, BackendType, DefaultBackendFactory, ProcessorConfig, ProcessorConfigBuilder,
    StylizeProcessor,
};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{PreparedImage, ProcessingMetadata, ProcessingTimings, StylizedImage};
pub use utils::{
    ExecutionProviderManager, ImagePostprocessor, ImagePreprocessor, ModelValidator,
    PreprocessingOptions, ProviderInfo, TensorValidator,
};

#[cfg(feature = "cli")]
pub use tracing_config::{
    events, init_cli_tracing, new_session_id, spans, TracingConfig, TracingFormat, TracingGuard,
    TracingOutput,
};

/// Where the image for a one-shot call comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image in memory
    Bytes(Vec<u8>),
}

/// What a one-shot call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferOutput {
    /// Encoded image (PNG) when no output path was given
    Bytes(Vec<u8>),
    /// Path of the written file
    Written(PathBuf),
}

/// Stylize one image with a freshly loaded model
///
/// With `output` set, the result is written there in the format its
/// extension names; otherwise PNG bytes are returned. Nothing is written
/// when any step fails.
///
/// # Errors
/// - `ModelLoad` when the weights are unreadable or incompatible
/// - `ImageDecode` when the input is not a decodable image
/// - `ImageTooSmall` when alignment collapses a side to zero
/// - `Inference` when the network call fails
/// - `UnsupportedFormat` for an unknown output extension
pub fn infer(
    weights_path: &Path,
    input: ImageInput,
    output: Option<&Path>,
    provider: ExecutionProvider,
    upsample_align: bool,
) -> Result<InferOutput> {
    let config = ProcessorConfig::builder()
        .weights_path(weights_path)
        .execution_provider(provider)
        .upsample_align(upsample_align)
        .build()?;
    let mut processor = StylizeProcessor::new(config)?;
    infer_with_processor(&mut processor, input, output)
}

/// Run the [`infer`] contract on an existing processor
///
/// The processor is initialized first, so model problems surface before
/// the input is looked at.
///
/// # Errors
/// - Same as [`infer`]
pub fn infer_with_processor(
    processor: &mut StylizeProcessor,
    input: ImageInput,
    output: Option<&Path>,
) -> Result<InferOutput> {
    if let Some(path) = output {
        OutputFormat::from_path(path)?;
    }
    processor.initialize()?;

    match (input, output) {
        (ImageInput::Path(input_path), Some(output_path)) => {
            processor.process_file_to_path(&input_path, output_path)?;
            Ok(InferOutput::Written(output_path.to_path_buf()))
        },
        (ImageInput::Bytes(bytes), Some(output_path)) => {
            let mut result = processor.process_bytes(&bytes)?;
            result.save_timed(output_path, processor.config().jpeg_quality)?;
            Ok(InferOutput::Written(output_path.to_path_buf()))
        },
        (input, None) => {
            let mut result = match input {
                ImageInput::Path(input_path) => processor.process_file(&input_path)?,
                ImageInput::Bytes(bytes) => processor.process_bytes(&bytes)?,
            };
            let bytes = processor.encode(&mut result)?;
            Ok(InferOutput::Bytes(bytes))
        },
    }
}

/// Stylize an image provided as bytes
///
/// # Examples
/// ```rust,no_run
/// use anime_stylize::{stylize_from_bytes, ProcessorConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = ProcessorConfig::builder()
///     .weights_path("weights/celeba_distill.onnx")
///     .build()?;
/// let result = stylize_from_bytes(&upload, &config).await?;
/// let png = result.to_bytes(anime_stylize::OutputFormat::Png, 90)?;
/// # Ok(())
/// # }
/// ```
pub async fn stylize_from_bytes(image_bytes: &[u8], config: &ProcessorConfig) -> Result<StylizedImage> {
    let mut processor = StylizeProcessor::with_factory(config.clone(), Arc::new(DefaultBackendFactory))?;
    processor.process_bytes(image_bytes)
}

/// Stylize an image read from an async stream
///
/// # Examples
/// ```rust,no_run
/// use anime_stylize::{stylize_from_reader, ProcessorConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = ProcessorConfig::builder()
///     .weights_path("weights/paprika.onnx")
///     .build()?;
/// let file = File::open("street.jpg").await?;
/// let mut result = stylize_from_reader(file, &config).await?;
/// result.save_timed("street_anime.png", 90)?;
/// # Ok(())
/// # }
/// ```
pub async fn stylize_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &ProcessorConfig,
) -> Result<StylizedImage> {
    let mut processor = StylizeProcessor::with_factory(config.clone(), Arc::new(DefaultBackendFactory))?;
    processor.process_reader(reader).await
}
