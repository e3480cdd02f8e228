//! Anime stylization CLI
//!
//! Command-line interface over the stylization processor and batch runner.

use super::config::CliConfigBuilder;
use super::progress::IndicatifProgressReporter;
use crate::{
    batch::{BatchJob, BatchOutcome, BatchProcessor},
    config::{OutputFormat, DEFAULT_MAX_EDGE},
    models::{format_size, WEIGHTS_DIR_ENV},
    processor::{ProcessorConfig, StylizeProcessor},
    services::ImageIOService,
    tracing_config::{events, init_cli_tracing, new_session_id, spans},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Turn photos into anime-style images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "anime-stylize")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present_any = &["show_providers", "list_models"])]
    pub input: Vec<String>,

    /// Output file, output directory, or "-" for stdout
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Model name from the weights directory or path to an .onnx file
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Backend and execution provider (e.g. onnx:auto, onnx:cuda:1, tract:cpu)
    #[arg(short, long, value_name = "BACKEND:PROVIDER")]
    pub execution_provider: Option<String>,

    /// Longest edge the network sees; larger photos are downscaled
    #[arg(long, default_value_t = DEFAULT_MAX_EDGE)]
    pub max_edge: u32,

    /// Keep inference sizes as they are instead of flooring to multiples of 32
    #[arg(long)]
    pub no_align: bool,

    /// Forward the align flag to the network's upsampling layers
    #[arg(long)]
    pub upsample_align: bool,

    /// Number of images stylized concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Output format for batch and stdout output
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Number of threads per backend session (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Only take directory files whose name matches this glob
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Directory scanned for .onnx weights
    #[arg(long, value_name = "DIR")]
    pub weights_dir: Option<PathBuf>,

    /// Write the batch outcome as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// List models in the weights directory
    #[arg(long)]
    pub list_models: bool,

    /// Show backends and execution providers available in this build
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Bmp,
    Tiff,
    #[cfg(feature = "webp-support")]
    Webp,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Bmp => Self::Bmp,
            CliOutputFormat::Tiff => Self::Tiff,
            #[cfg(feature = "webp-support")]
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = new_session_id();
    let _tracing_guard =
        init_cli_tracing(cli.verbose, &session_id).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    if cli.list_models {
        return list_models(&cli);
    }

    if cli.input.is_empty() {
        anyhow::bail!("At least one input is required");
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    let weights_path = CliConfigBuilder::resolve_weights(&cli)?;
    let config = CliConfigBuilder::from_cli(&cli, weights_path)
        .context("Failed to build configuration")?;

    let model_name = model_name(&config);
    let provider = ExecutionProviderManager::provider_to_string(
        config.backend_type,
        config.execution_provider,
    );
    info!("🎨 Starting anime stylization");
    info!("Model: {} ({})", model_name, config.weights_path.display());
    info!("Backend: {}, Provider: {}", config.backend_type, config.execution_provider);

    let session = spans::session(&session_id, &model_name, &provider);
    run(&cli, config).instrument(session).await
}

async fn run(cli: &Cli, config: ProcessorConfig) -> Result<()> {
    if cli.input.first().is_some_and(|input| input == "-") {
        return process_stdin(cli, config).await;
    }

    let files = collect_inputs(cli)?;
    if files.is_empty() {
        events::warning_with_recommendation(
            "No supported image files found in the provided inputs",
            "check the paths, --recursive and --pattern",
        );
        return Ok(());
    }
    info!("Found {} image file(s) to process", files.len());

    if files.len() == 1 && cli.output.as_deref() == Some("-") {
        return process_file_to_stdout(config, files.first().map(PathBuf::as_path));
    }

    let jobs = plan_jobs(cli, &files, config.output_format)?;
    let outcome = run_batch(cli, config, jobs).await?;
    finish_batch(cli, &outcome)
}

/// Model name shown in logs, taken from the weights file stem
fn model_name(config: &ProcessorConfig) -> String {
    config
        .weights_path
        .file_stem()
        .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Display execution provider diagnostics using core utilities
fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🔧 Available Backends:");
    #[cfg(feature = "onnx")]
    println!("  • onnx: ONNX Runtime backend - hardware acceleration support");
    #[cfg(feature = "tract")]
    println!("  • tract: Pure Rust backend - no native dependencies");

    println!("\n🚀 Execution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "✅ Available"
        } else {
            "❌ Not Available"
        };
        println!(
            "  • {}: {} - {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\n💡 Usage Examples:");
    println!("  -e onnx:auto     # Best available ONNX provider");
    println!("  -e onnx:cuda:1   # NVIDIA GPU 1");
    println!("  -e onnx:coreml   # Apple CoreML (macOS)");
    println!("  -e tract:cpu     # Pure Rust Tract backend");
}

/// List weights found in the weights directory
fn list_models(cli: &Cli) -> Result<()> {
    let catalog = CliConfigBuilder::catalog(cli)?;
    let entries = catalog.scan().context("Failed to scan weights directory")?;

    println!("📦 Models in {}", catalog.weights_dir().display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if entries.is_empty() {
        println!("No .onnx weights found.");
        println!(
            "💡 Place AnimeGAN weights here, pass --weights-dir, or set {WEIGHTS_DIR_ENV}."
        );
        return Ok(());
    }

    for entry in &entries {
        println!(
            "  • {:<20} {:>10}  {}",
            entry.name,
            format_size(entry.size_bytes),
            entry.description.as_deref().unwrap_or("custom weights")
        );
    }
    println!("\n💡 Use a model with: anime-stylize --model NAME input.jpg");

    Ok(())
}

/// Stylize an image read from stdin
async fn process_stdin(cli: &Cli, config: ProcessorConfig) -> Result<()> {
    info!("Reading image from stdin");
    let jpeg_quality = config.jpeg_quality;
    let mut processor = load_processor(config)?;

    let mut result = processor
        .process_reader(tokio::io::stdin())
        .await
        .context("Failed to stylize image from stdin")?;

    match cli.output.as_deref() {
        None | Some("-") => {
            let bytes = processor.encode(&mut result)?;
            write_stdout(&bytes)?;
            info!("Image written to stdout");
        },
        Some(target) => {
            result
                .save_timed(target, jpeg_quality)
                .with_context(|| format!("Failed to save result to {target}"))?;
            info!("Image saved to: {target}");
        },
    }
    info!("{}", result.timing_summary());

    Ok(())
}

/// Stylize one file and write the encoded result to stdout
fn process_file_to_stdout(config: ProcessorConfig, input: Option<&Path>) -> Result<()> {
    let input = input.context("No input file")?;
    let mut processor = load_processor(config)?;

    let mut result = processor
        .process_file(input)
        .with_context(|| format!("Failed to stylize {}", input.display()))?;
    let bytes = processor.encode(&mut result)?;
    write_stdout(&bytes)?;
    info!("{}", result.timing_summary());

    Ok(())
}

/// Create and initialize a processor inside the model loading span
fn load_processor(config: ProcessorConfig) -> Result<StylizeProcessor> {
    let span = spans::model_loading(&model_name(&config), &config.backend_type.to_string());
    let _entered = span.enter();

    let started = Instant::now();
    let mut processor = StylizeProcessor::new(config)?;
    if let Err(e) = processor.initialize() {
        events::error_with_context(&e, "loading model");
        return Err(e).context("Failed to load model");
    }
    events::performance_metric("model_load", started.elapsed().as_millis() as u64);

    Ok(processor)
}

/// Map inputs to batch jobs
///
/// A single input with an output path that names an image file is written
/// there; everything else goes into the output directory, or a fresh
/// timestamped directory under `outputs/` when none is given.
fn plan_jobs(cli: &Cli, files: &[PathBuf], format: OutputFormat) -> Result<Vec<BatchJob>> {
    if let ([input], Some(output)) = (files, cli.output.as_deref()) {
        let output_path = PathBuf::from(output);
        if !output_path.is_dir() && OutputFormat::from_path(&output_path).is_ok() {
            return Ok(vec![BatchJob::new(input.clone(), output_path)]);
        }
    }

    let output_dir = match cli.output.as_deref() {
        Some("-") => anyhow::bail!("Cannot use stdout (-) as output when processing multiple files"),
        Some(output) => PathBuf::from(output),
        None => timestamped_output_dir(Local::now().naive_local()),
    };

    if output_dir.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_dir.display()
        );
    }
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;
    info!("📁 Writing results to {}", output_dir.display());

    Ok(BatchJob::plan(files, &output_dir, format))
}

/// `outputs/YYYY-MM-DD_HH-MM-SS` for the given moment
fn timestamped_output_dir(now: NaiveDateTime) -> PathBuf {
    Path::new("outputs").join(now.format("%Y-%m-%d_%H-%M-%S").to_string())
}

async fn run_batch(cli: &Cli, config: ProcessorConfig, jobs: Vec<BatchJob>) -> Result<BatchOutcome> {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    if cli.jobs > cpu_count {
        events::warning_with_recommendation(
            &format!("{} jobs requested on {cpu_count} CPU cores", cli.jobs),
            "each job holds its own model session; lower --jobs if memory runs short",
        );
    }

    let reporter = Arc::new(IndicatifProgressReporter::new(jobs.len()));
    let batch = BatchProcessor::new(config, cli.jobs).with_reporter(reporter.clone());

    let outcome = match batch.run(jobs).await {
        Ok(outcome) => outcome,
        Err(e) => {
            events::error_with_context(&e, "loading model");
            return Err(e).context("Failed to load model");
        },
    };
    reporter.finish(outcome.succeeded.len(), outcome.failed.len());

    Ok(outcome)
}

/// Print the summary, write the report, and fail when any item failed
fn finish_batch(cli: &Cli, outcome: &BatchOutcome) -> Result<()> {
    for failure in &outcome.failed {
        error!(
            "❌ {} ({}): {}",
            failure.input.display(),
            failure.kind,
            failure.message
        );
    }

    info!("📊 Batch summary:");
    info!("  ├─ Images stylized: {}", outcome.succeeded.len());
    info!("  ├─ Images failed: {}", outcome.failed.len());
    info!("  ├─ Total time: {:.2}s", outcome.elapsed_ms as f64 / 1000.0);
    info!(
        "  └─ Average per image: {:.2}s",
        if outcome.succeeded.is_empty() {
            0.0
        } else {
            outcome.elapsed_ms as f64 / 1000.0 / outcome.succeeded.len() as f64
        }
    );
    if let [single] = outcome.succeeded.as_slice() {
        info!("Image saved to: {}", single.output.display());
    }

    if let Some(report) = &cli.report {
        outcome
            .write_report(report)
            .with_context(|| format!("Failed to write report to {}", report.display()))?;
        info!("📝 Report written to {}", report.display());
    }

    events::progress(
        &format!(
            "All done: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        ),
        "🎉",
    );
    events::performance_metric("batch", outcome.elapsed_ms);

    if !outcome.is_complete() {
        anyhow::bail!(
            "{} of {} image(s) failed",
            outcome.failed.len(),
            outcome.total()
        );
    }

    Ok(())
}

/// Expand files and directories into a sorted list of image files
fn collect_inputs(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);

        if path.is_file() {
            if ImageIOService::is_supported_format(&path) {
                files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let walker = if recursive {
        walkdir::WalkDir::new(dir)
    } else {
        walkdir::WalkDir::new(dir).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && ImageIOService::is_supported_format(path)
            && matches_pattern(path, pattern)
        {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Check if a file name matches the given glob
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
