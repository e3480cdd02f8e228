//! Tract backend implementation for style networks
//!
//! Pure Rust inference with no native dependencies. Style networks are fully
//! convolutional, so the input size varies per image; Tract wants concrete
//! shapes to optimize, so one runnable plan is built per `(height, width)`.
//! Only the most recently used plans are kept; each one is a full optimized
//! copy of the graph.

use crate::config::StylizeConfig;
use crate::error::{Result, StylizeError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelWeights};
use ndarray::{Array4, Ix4};
use std::collections::VecDeque;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractPlan = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Number of shape-specific plans kept per backend
const MAX_CACHED_PLANS: usize = 4;

/// Least-recently-used cache of values keyed by input `(height, width)`
#[derive(Debug)]
struct PlanCache<T> {
    capacity: usize,
    /// Most recently used first
    entries: VecDeque<((usize, usize), T)>,
}

impl<T> PlanCache<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the value for `key`, building it on a miss and evicting the
    /// least recently used entry when full
    fn get_or_try_insert_with<F>(&mut self, key: (usize, usize), build: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(position) = self.entries.iter().position(|(k, _)| *k == key) {
            if let Some(entry) = self.entries.remove(position) {
                self.entries.push_front(entry);
            }
        } else {
            let value = build()?;
            if self.entries.len() >= self.capacity {
                if let Some(((height, width), _)) = self.entries.pop_back() {
                    log::debug!("Evicted Tract plan for {width}x{height}");
                }
            }
            self.entries.push_front((key, value));
        }

        self.entries
            .front()
            .map(|(_, value)| value)
            .ok_or_else(|| StylizeError::internal("Tract plan cache empty after insertion"))
    }
}

/// Tract backend for running style networks using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    weights: ModelWeights,
    model: Option<InferenceModel>,
    plans: PlanCache<TractPlan>,
    input_count: usize,
    initialized: bool,
}

impl TractBackend {
    /// List all Tract execution providers with availability status and descriptions
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::backends::TractBackend;
    ///
    /// for (name, available, description) in TractBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "✅" } else { "❌" }, description);
    /// }
    /// ```
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a backend over shared weights; the graph is parsed on `initialize`
    #[must_use]
    pub fn new(weights: ModelWeights) -> Self {
        Self {
            weights,
            model: None,
            plans: PlanCache::new(MAX_CACHED_PLANS),
            input_count: 0,
            initialized: false,
        }
    }

    /// Number of shape-specific plans currently cached
    #[must_use]
    pub fn cached_plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Parse the ONNX graph from the shared weights
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {}", self.weights.name());
        log::info!("⚡ Execution Provider: CPU (Pure Rust)");
        let size_mb = self.weights.size_bytes() as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(self.weights.bytes()))
            .map_err(|e| {
                StylizeError::model_load(format!(
                    "Failed to parse ONNX model '{}': {e}",
                    self.weights.name()
                ))
            })?;

        self.input_count = model.inputs.len();
        if self.input_count == 0 {
            return Err(StylizeError::model_load(format!(
                "Model '{}' declares no inputs",
                self.weights.name()
            )));
        }

        self.model = Some(model);
        self.plans.clear();
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }

    /// Get or build the optimized plan for one input size
    fn plan_for(&mut self, height: usize, width: usize) -> Result<&TractPlan> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| StylizeError::inference("Tract model not initialized"))?;
        let input_count = self.input_count;

        self.plans.get_or_try_insert_with((height, width), || {
            let plan_start = Instant::now();
            let mut typed = model
                .clone()
                .with_input_fact(0, f32::fact([1, 3, height, width]).into())
                .map_err(|e| StylizeError::inference(format!("Failed to set input shape: {e}")))?;
            if input_count >= 2 {
                typed = typed
                    .with_input_fact(1, bool::fact([1]).into())
                    .map_err(|e| {
                        StylizeError::inference(format!("Failed to set align flag shape: {e}"))
                    })?;
            }
            let plan = typed
                .into_optimized()
                .map_err(|e| StylizeError::inference(format!("Failed to optimize model: {e}")))?
                .into_runnable()
                .map_err(|e| {
                    StylizeError::inference(format!("Failed to create runnable model: {e}"))
                })?;

            log::debug!(
                "Built Tract plan for {}x{} in {}ms",
                width,
                height,
                plan_start.elapsed().as_millis()
            );
            Ok(plan)
        })
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &StylizeConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>, upsample_align: bool) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(StylizeError::inference("Backend not initialized"));
        }

        let (_, _, height, width) = input.dim();
        let takes_align_flag = self.input_count >= 2;
        if upsample_align && !takes_align_flag {
            log::debug!("Model takes a single input, ignoring upsample-align flag");
        }

        let plan = self.plan_for(height, width)?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let mut inputs: TVec<TValue> = tvec![Tensor::from(input.clone()).into()];
        if takes_align_flag {
            inputs.push(tensor1(&[upsample_align]).into());
        }

        let outputs = plan
            .run(inputs)
            .map_err(|e| StylizeError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| StylizeError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            StylizeError::inference(format!("Failed to convert output tensor: {e}"))
        })?;
        let output_dims = output_view.ndim();
        let output_array = output_view
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|_| {
                StylizeError::inference(format!("Expected 4D output tensor, got {output_dims}D"))
            })?;

        log::debug!(
            "✅ Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );

        Ok(output_array)
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.weights.info())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_tract_backend_creation() {
        let backend = TractBackend::new(ModelWeights::from_bytes("celeba_distill", vec![0; 4]));
        assert!(!backend.is_initialized());
        assert_eq!(backend.cached_plan_count(), 0);
        let info = backend.get_model_info().unwrap();
        assert_eq!(info.name, "celeba_distill");
        assert!(info.description.is_some());
    }

    #[test]
    fn test_garbage_weights_fail_as_model_load() {
        let mut backend =
            TractBackend::new(ModelWeights::from_bytes("garbage", b"not an onnx graph".to_vec()));
        let err = backend.initialize(&StylizeConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = TractBackend::new(ModelWeights::from_bytes("paprika", vec![0; 4]));
        let err = backend
            .infer(&Array4::<f32>::zeros((1, 3, 32, 32)), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
    }

    #[test]
    fn test_plan_cache_evicts_least_recently_used() {
        let mut cache: PlanCache<String> = PlanCache::new(2);
        let mut builds = 0;
        let mut get = |cache: &mut PlanCache<String>, key: (usize, usize)| {
            cache
                .get_or_try_insert_with(key, || {
                    builds += 1;
                    Ok(format!("{}x{}", key.1, key.0))
                })
                .unwrap()
                .clone()
        };

        assert_eq!(get(&mut cache, (576, 800)), "800x576");
        assert_eq!(get(&mut cache, (768, 1024)), "1024x768");
        // Touch the first shape so the second becomes least recently used
        assert_eq!(get(&mut cache, (576, 800)), "800x576");
        assert_eq!(get(&mut cache, (32, 32)), "32x32");
        assert_eq!(get(&mut cache, (576, 800)), "800x576");
        assert_eq!(get(&mut cache, (768, 1024)), "1024x768");

        assert_eq!(builds, 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_plan_cache_build_failure_leaves_cache_untouched() {
        let mut cache: PlanCache<u8> = PlanCache::new(MAX_CACHED_PLANS);
        cache.get_or_try_insert_with((32, 32), || Ok(1)).unwrap();
        let err = cache
            .get_or_try_insert_with((64, 64), || Err(StylizeError::inference("optimize failed")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.get_or_try_insert_with((32, 32), || Ok(2)).unwrap(), 1);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_list_providers_cpu_only() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, "CPU");
        assert!(providers[0].1);
    }
}
