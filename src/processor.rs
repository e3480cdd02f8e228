//! Stylization processor
//!
//! `StylizeProcessor` is the explicit context object of the crate: it holds
//! the configuration, the shared model weights and one initialized backend
//! session. The CLI, the one-shot [`infer`](crate::infer) call and every
//! batch worker go through it, so all of them behave identically.

use crate::{
    adapter::ImageAdapter,
    config::{ExecutionProvider, OutputFormat, StylizeConfig, DEFAULT_MAX_EDGE},
    error::{Result, StylizeError},
    inference::InferenceBackend,
    models::{ModelInfo, ModelWeights},
    services::{ImageIOService, ProcessingStage, ProgressTracker},
    types::{ProcessingMetadata, ProcessingTimings, StylizedImage},
    utils::TensorValidator,
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info as trace_info, instrument};

/// Backend type enumeration for runtime selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl BackendType {
    /// The backend compiled into this build that runs by default
    #[must_use]
    pub fn preferred() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => f.write_str("onnx"),
            Self::Tract => f.write_str("tract"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = StylizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(StylizeError::invalid_config(format!(
                "Unknown backend '{other}'. Expected 'onnx' or 'tract'"
            ))),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend over the given weights
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends compiled into this build
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new(weights))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new(weights))),
            #[allow(unreachable_patterns)]
            other => {
                drop(weights);
                Err(StylizeError::invalid_config(format!(
                    "Backend '{other}' is not available in this build. Available: {:?}",
                    self.available_backends()
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Configuration for the stylization processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Path to the ONNX weights file
    pub weights_path: PathBuf,
    /// Backend type to use for inference
    pub backend_type: BackendType,
    /// Execution provider for the backend
    pub execution_provider: ExecutionProvider,
    /// Encoding used when no destination path dictates one
    pub output_format: OutputFormat,
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
    /// Maximum edge length before inference
    pub max_edge: u32,
    /// Floor inference sizes to multiples of 32
    pub align_to_32: bool,
    /// Forwarded to the network's upsampling layers
    pub upsample_align: bool,
    /// Enable debug mode
    pub debug: bool,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Enable verbose progress reporting
    pub verbose_progress: bool,
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// The subset of settings backends and the adapter consume
    #[must_use]
    pub fn to_stylize_config(&self) -> StylizeConfig {
        StylizeConfig {
            execution_provider: self.execution_provider,
            output_format: self.output_format,
            jpeg_quality: self.jpeg_quality,
            max_edge: self.max_edge,
            align_to_32: self.align_to_32,
            upsample_align: self.upsample_align,
            debug: self.debug,
            intra_threads: self.intra_threads,
            inter_threads: self.inter_threads,
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::new(),
            backend_type: BackendType::preferred(),
            execution_provider: ExecutionProvider::Auto,
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
            max_edge: DEFAULT_MAX_EDGE,
            align_to_32: true,
            upsample_align: false,
            debug: false,
            intra_threads: 0,
            inter_threads: 0,
            verbose_progress: false,
        }
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn weights_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.weights_path = path.into();
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn max_edge(mut self, max_edge: u32) -> Self {
        self.config.max_edge = max_edge;
        self
    }

    #[must_use]
    pub fn align_to_32(mut self, align: bool) -> Self {
        self.config.align_to_32 = align;
        self
    }

    #[must_use]
    pub fn upsample_align(mut self, align: bool) -> Self {
        self.config.upsample_align = align;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn verbose_progress(mut self, verbose: bool) -> Self {
        self.config.verbose_progress = verbose;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Any rule checked by [`StylizeConfig::validate`]
    pub fn build(self) -> Result<ProcessorConfig> {
        self.config.to_stylize_config().validate()?;
        Ok(self.config)
    }
}

/// Stylization context: configuration, weights and one backend session
pub struct StylizeProcessor {
    config: ProcessorConfig,
    stylize_config: StylizeConfig,
    adapter: ImageAdapter,
    backend_factory: Arc<dyn BackendFactory>,
    weights: Option<ModelWeights>,
    backend: Option<Box<dyn InferenceBackend>>,
    pending_model_load_ms: Option<u64>,
    initialized: bool,
    progress_tracker: Option<ProgressTracker>,
}

impl StylizeProcessor {
    /// Create a processor using the backends compiled into this build
    ///
    /// # Errors
    /// - Invalid processor configuration
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid processor configuration
    pub fn with_factory(config: ProcessorConfig, backend_factory: Arc<dyn BackendFactory>) -> Result<Self> {
        let stylize_config = config.to_stylize_config();
        stylize_config.validate()?;

        Ok(Self {
            adapter: ImageAdapter::from_config(&stylize_config),
            stylize_config,
            config,
            backend_factory,
            weights: None,
            backend: None,
            pending_model_load_ms: None,
            initialized: false,
            progress_tracker: None,
        })
    }

    /// Create a processor over weights that are already in memory
    ///
    /// Used by batch workers so every session shares one weights buffer.
    ///
    /// # Errors
    /// - Invalid processor configuration
    pub fn with_weights(
        config: ProcessorConfig,
        backend_factory: Arc<dyn BackendFactory>,
        weights: ModelWeights,
    ) -> Result<Self> {
        let mut processor = Self::with_factory(config, backend_factory)?;
        processor.weights = Some(weights);
        Ok(processor)
    }

    /// Attach a progress tracker
    #[must_use]
    pub fn with_progress_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = Some(tracker);
        self
    }

    fn report_stage(&mut self, stage: ProcessingStage) {
        if let Some(ref mut tracker) = self.progress_tracker {
            tracker.report_stage(stage);
        }
    }

    fn report_error(&self, error: &StylizeError) {
        if let Some(ref tracker) = self.progress_tracker {
            tracker.report_error(&error.to_string());
        }
    }

    /// Load the weights (unless provided) and initialize a backend session
    ///
    /// # Errors
    /// - `ModelLoad` when the weights are unreadable or the session cannot
    ///   be created from them
    /// - `InvalidConfig` when the backend is not compiled into this build
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.report_stage(ProcessingStage::Initialization);
        let init_start = Instant::now();

        info!("Initializing stylization processor");
        debug!("Backend type: {}", self.config.backend_type);
        debug!("Execution provider: {}", self.config.execution_provider);

        let weights = match self.weights.take() {
            Some(weights) => weights,
            None => ModelWeights::load(&self.config.weights_path)?,
        };
        self.weights = Some(weights.clone());

        let mut backend = self
            .backend_factory
            .create_backend(self.config.backend_type, weights)?;

        let load_time = backend.initialize(&self.stylize_config).map_err(|e| match e {
            StylizeError::ModelLoad(_) => e,
            other => StylizeError::model_load(other.to_string()),
        });
        let load_time = match load_time {
            Ok(load_time) => load_time,
            Err(e) => {
                self.report_error(&e);
                return Err(e);
            },
        };

        self.pending_model_load_ms = Some(
            load_time.map_or_else(|| init_start.elapsed().as_millis(), |d| d.as_millis()) as u64,
        );
        self.backend = Some(backend);
        self.initialized = true;

        info!("Stylization processor initialized successfully");
        Ok(())
    }

    /// Load an image file and stylize it
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `ImageDecode` when the file is not a decodable image
    /// - Any error of [`process_image`](Self::process_image)
    #[instrument(name = "file_processing", skip(self, input_path), fields(input = %input_path.as_ref().display()))]
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<StylizedImage> {
        let input_path_ref = input_path.as_ref();

        self.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let image = match ImageIOService::load_image(input_path_ref) {
            Ok(image) => image,
            Err(e) => {
                self.report_error(&e);
                return Err(e);
            },
        };
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let input_format = image::ImageFormat::from_path(input_path_ref)
            .ok()
            .map(|f| format!("{f:?}"));

        let result = self.process_decoded(&image, decode_ms, input_format)?;
        Ok(result.with_input_path(input_path_ref.display().to_string()))
    }

    /// Decode image bytes and stylize them
    ///
    /// # Errors
    /// - `ImageDecode` when the bytes are not a decodable image
    /// - Any error of [`process_image`](Self::process_image)
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<StylizedImage> {
        self.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let image = ImageIOService::load_from_bytes(image_bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let input_format = image::guess_format(image_bytes).ok().map(|f| format!("{f:?}"));
        self.process_decoded(&image, decode_ms, input_format)
    }

    /// Read image bytes from an async reader and stylize them
    ///
    /// # Errors
    /// - Stream read failures
    /// - Any error of [`process_bytes`](Self::process_bytes)
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &mut self,
        mut reader: R,
    ) -> Result<StylizedImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        self.process_bytes(&buffer)
    }

    /// Stylize an already decoded image
    ///
    /// Initializes the processor on first use.
    ///
    /// # Errors
    /// - `ModelLoad` from lazy initialization
    /// - `ImageTooSmall` when the inference size collapses to zero
    /// - `Inference` when the network call fails
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<StylizedImage> {
        self.process_decoded(image, 0, None)
    }

    /// Stylize `input_path` and write the result to `output_path`
    ///
    /// The output format follows the destination's extension. Nothing is
    /// written unless the whole pipeline succeeds.
    ///
    /// # Errors
    /// - `UnsupportedFormat` for an unknown destination extension, checked
    ///   before any work is done
    /// - Any error of [`process_file`](Self::process_file)
    /// - Encoding or file system failures
    pub fn process_file_to_path<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input_path: P,
        output_path: Q,
    ) -> Result<StylizedImage> {
        let output_ref = output_path.as_ref();
        OutputFormat::from_path(output_ref)?;

        let mut result = self.process_file(input_path)?;

        self.report_stage(ProcessingStage::FileSaving);
        if let Err(e) = result.save_timed(output_ref, self.config.jpeg_quality) {
            self.report_error(&e);
            return Err(e);
        }

        if let Some(ref tracker) = self.progress_tracker {
            tracker.report_completion(result.metadata.timings.clone());
        }
        Ok(result)
    }

    /// Encode a result with the configured output format
    ///
    /// # Errors
    /// - Encoder failures or a format not compiled into this build
    pub fn encode(&mut self, result: &mut StylizedImage) -> Result<Vec<u8>> {
        self.report_stage(ProcessingStage::Encoding);
        let encode_start = Instant::now();
        let bytes = result.to_bytes(self.config.output_format, self.config.jpeg_quality)?;
        result.metadata.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        result.metadata.output_format = self.config.output_format.to_string();
        Ok(bytes)
    }

    #[instrument(
        skip(self, image, input_format),
        fields(
            backend = %self.config.backend_type,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn process_decoded(
        &mut self,
        image: &DynamicImage,
        decode_ms: u64,
        input_format: Option<String>,
    ) -> Result<StylizedImage> {
        self.initialize()?;

        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            image_decode_ms: decode_ms,
            model_load_ms: self.pending_model_load_ms.take().unwrap_or(0),
            ..ProcessingTimings::default()
        };

        TensorValidator::validate_image_dimensions(image.width(), image.height())?;

        trace_info!(backend = %self.config.backend_type, "🎨 Starting stylization");

        let result = self.run_pipeline(image, &mut timings);
        let (output, inference_dimensions) = match result {
            Ok(output) => output,
            Err(e) => {
                self.report_error(&e);
                return Err(e);
            },
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64 + decode_ms;

        let mut metadata = ProcessingMetadata::new(self.model_name());
        metadata.backend = self.config.backend_type.to_string();
        if let Some(format) = input_format {
            metadata.input_format = format;
        }
        metadata.output_format = self.config.output_format.to_string();
        metadata.timings = timings;

        self.report_stage(ProcessingStage::Completed);
        Ok(StylizedImage::new(
            output,
            (image.width(), image.height()),
            inference_dimensions,
            metadata,
        ))
    }

    /// Prepare, run and restore with stage timings
    fn run_pipeline(
        &mut self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
    ) -> Result<(image::RgbImage, (u32, u32))> {
        self.report_stage(ProcessingStage::Preprocessing);
        let preprocess_start = Instant::now();
        let prepared = self.adapter.prepare(image)?;
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        if self.config.debug {
            TensorValidator::validate_tensor_value_range(&prepared.tensor, -1.0, 1.0)?;
            debug!(
                "Prepared tensor {:?} (resampled: {})",
                prepared.shape(),
                prepared.resampled
            );
        }

        self.report_stage(ProcessingStage::Inference);
        let inference_start = Instant::now();
        let backend = self
            .backend
            .as_deref_mut()
            .ok_or_else(|| StylizeError::inference("Backend not initialized"))?;
        let raw_output =
            self.adapter
                .run_inference(backend, &prepared.tensor, self.config.upsample_align)?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        self.report_stage(ProcessingStage::Postprocessing);
        let postprocess_start = Instant::now();
        let output = self.adapter.restore(&raw_output, prepared.original_size)?;
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;

        Ok((output, prepared.target_size))
    }

    fn model_name(&self) -> String {
        self.weights
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |w| w.name().to_string())
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The image adapter this processor runs
    #[must_use]
    pub fn adapter(&self) -> &ImageAdapter {
        &self.adapter
    }

    /// Check if the processor is initialized
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Weights loaded by this processor, if any
    #[must_use]
    pub fn weights(&self) -> Option<&ModelWeights> {
        self.weights.as_ref()
    }

    /// Model information from the active backend
    ///
    /// # Errors
    /// - Processor not initialized
    pub fn model_info(&self) -> Result<ModelInfo> {
        self.backend
            .as_ref()
            .ok_or_else(|| StylizeError::internal("Processor not initialized"))?
            .get_model_info()
    }

    /// Get available backends from the factory
    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }
}
