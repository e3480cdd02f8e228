//! ONNX Runtime backend implementation for style networks
//!
//! Runs the style network through ONNX Runtime with support for multiple
//! execution providers (CPU, CUDA, CoreML). The session is built from the
//! shared in-memory weights, so every worker can own one without touching
//! the disk again.

use crate::config::{ExecutionProvider, StylizeConfig};
use crate::error::{Result, StylizeError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelWeights};
use ndarray::{Array1, Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend for running style networks
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    weights: ModelWeights,
    input_count: usize,
    initialized: bool,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "✅" } else { "❌" }, description);
    /// }
    /// ```
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let mut providers = Vec::new();

        log::debug!("🔍 System Hardware Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);
        log::debug!(
            "  - CPU cores: {cores}",
            cores = std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        );

        providers.push((
            "CPU".to_string(),
            true,
            "Always available, uses CPU for inference".to_string(),
        ));

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        if cuda_available {
            log::info!("✅ CUDA execution provider is available");
        } else {
            log::debug!("❌ CUDA execution provider is not available");
        }
        providers.push((
            "CUDA".to_string(),
            cuda_available,
            "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
        ));

        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);
        if coreml_available {
            log::info!("✅ CoreML execution provider is available");
        } else {
            #[cfg(target_os = "macos")]
            log::warn!("❌ CoreML execution provider is not available on this Mac");
            #[cfg(not(target_os = "macos"))]
            log::debug!("❌ CoreML execution provider is only available on macOS");
        }
        providers.push((
            "CoreML".to_string(),
            coreml_available,
            "Apple Silicon GPU acceleration (macOS only)".to_string(),
        ));

        providers
    }

    /// Create a backend over shared weights; the session is built on `initialize`
    #[must_use]
    pub fn new(weights: ModelWeights) -> Self {
        Self {
            session: None,
            weights,
            input_count: 0,
            initialized: false,
        }
    }

    /// Whether the loaded network takes the upsample-align flag as a second input
    #[must_use]
    pub fn accepts_align_flag(&self) -> bool {
        self.input_count >= 2
    }

    /// Execution providers to register, in priority order
    ///
    /// An empty list means plain CPU execution.
    fn select_providers(provider: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda_available = |device_id: i32| {
            let cuda = CUDAExecutionProvider::default().with_device_id(device_id);
            OrtExecutionProvider::is_available(&cuda).unwrap_or(false)
        };
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false)
        };

        match provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available(0) {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::warn!("⚠️ No hardware acceleration available, falling back to CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda { device_id } => {
                if cuda_available(device_id) {
                    log::info!("Using CUDA execution provider on device {device_id}");
                    vec![CUDAExecutionProvider::default()
                        .with_device_id(device_id)
                        .build()]
                } else {
                    log::warn!(
                        "CUDA device {device_id} requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    vec![CoreMLExecutionProvider::default().with_subgraphs(true).build()]
                } else {
                    log::warn!("🚫 CoreML execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
        }
    }

    /// Build the ONNX Runtime session from the shared weights
    fn load_model(&mut self, config: &StylizeConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let session_error = |stage: &str, e: ort::Error| {
            StylizeError::model_load(format!(
                "Failed to {stage} for '{}': {e}",
                self.weights.name()
            ))
        };

        let mut session_builder = Session::builder()
            .map_err(|e| session_error("create session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| session_error("set optimization level", e))?;

        let providers = Self::select_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| session_error("register execution providers", e))?;
        }

        let available = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available / 4).max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| session_error("enable parallel execution", e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| session_error("set intra threads", e))?
            .with_inter_threads(inter_threads)
            .map_err(|e| session_error("set inter threads", e))?
            .commit_from_memory(self.weights.bytes())
            .map_err(|e| session_error("create session from weights", e))?;

        self.input_count = session.inputs.len();
        if self.input_count == 0 {
            return Err(StylizeError::model_load(format!(
                "Model '{}' declares no inputs",
                self.weights.name()
            )));
        }

        log::debug!("✅ ONNX Runtime session created successfully");
        log::debug!("Session configuration:");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        log::debug!("  - Optimization level: Level3");
        log::debug!(
            "  - Model: {} ({} input(s))",
            self.weights.name(),
            self.input_count
        );
        let size_mb = self.weights.size_bytes() as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model size: {size_mb:.2} MB");

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &StylizeConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>, upsample_align: bool) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(StylizeError::inference("Backend not initialized"));
        }
        let accepts_align_flag = self.accepts_align_flag();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| StylizeError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| StylizeError::inference(format!("Failed to convert input tensor: {e}")))?;

        let run_result = if accepts_align_flag {
            let align_value = Value::from_array(Array1::from_elem(1, upsample_align)).map_err(|e| {
                StylizeError::inference(format!("Failed to convert align flag: {e}"))
            })?;
            session.run(ort::inputs![input_value, align_value])
        } else {
            if upsample_align {
                log::debug!("Model takes a single input, ignoring upsample-align flag");
            }
            session.run(ort::inputs![input_value])
        };
        let outputs =
            run_result.map_err(|e| StylizeError::inference(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| StylizeError::inference("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| StylizeError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    StylizeError::inference(format!("Failed to extract output tensor: {e}"))
                })?
                .to_owned()
        };

        let output_dims = output_tensor.ndim();
        let result = output_tensor.into_dimensionality::<Ix4>().map_err(|_| {
            StylizeError::inference(format!("Expected 4D output tensor, got {output_dims}D"))
        })?;

        log::debug!(
            "📊 Inference complete: {:.2}ms, output shape {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            result.dim()
        );

        Ok(result)
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.weights.info())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
