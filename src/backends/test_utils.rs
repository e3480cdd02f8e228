//! Test utilities and mock backends for testing inference functionality
//!
//! Mock implementations of the `InferenceBackend` trait that exercise the
//! full adapter and batch pipeline without model files or a runtime.

use crate::{
    config::StylizeConfig,
    error::{Result, StylizeError},
    inference::InferenceBackend,
    models::{ModelInfo, ModelWeights},
    processor::{BackendFactory, BackendType},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// What the mock network does to its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStyle {
    /// Returns the input unchanged
    Identity,
    /// Returns `-x`, a photographic negative after restoration
    Invert,
    /// Panics on tensors of the given width, identity otherwise
    PanicOnWidth(usize),
}

/// Mock style backend for testing
#[derive(Debug, Clone)]
pub struct MockStyleBackend {
    /// Whether the backend has been initialized
    initialized: bool,
    /// Transformation applied by `infer`
    style: MockStyle,
    /// Simulated model information
    model_info: ModelInfo,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    /// Whether to simulate initialization failure
    should_fail_init: bool,
    /// Whether to simulate inference failure
    should_fail_inference: bool,
}

impl MockStyleBackend {
    /// Create an identity mock backend
    #[must_use]
    pub fn new() -> Self {
        Self::with_style(MockStyle::Identity)
    }

    #[must_use]
    pub fn with_style(style: MockStyle) -> Self {
        Self {
            initialized: false,
            style,
            model_info: ModelInfo {
                name: "mock-style".to_string(),
                description: Some("Mock style network".to_string()),
                size_bytes: 1024 * 1024,
                path: None,
            },
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Share a call history with other backends
    #[must_use]
    pub fn with_call_history(mut self, call_history: Arc<Mutex<Vec<String>>>) -> Self {
        self.call_history = call_history;
        self
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    /// Record a method call for testing verification
    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl Default for MockStyleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockStyleBackend {
    fn initialize(&mut self, _config: &StylizeConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(StylizeError::model_load(
                "Mock backend initialization failed",
            ));
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>, upsample_align: bool) -> Result<Array4<f32>> {
        self.record_call(&format!("infer:{:?}:{upsample_align}", input.dim()));

        if !self.initialized {
            return Err(StylizeError::inference("Mock backend not initialized"));
        }

        if self.should_fail_inference {
            return Err(StylizeError::inference("Mock backend inference failed"));
        }

        Ok(match self.style {
            MockStyle::Identity => input.clone(),
            MockStyle::Invert => input.mapv(|v| -v),
            MockStyle::PanicOnWidth(width) => {
                assert_ne!(input.dim().3, width, "mock backend panic");
                input.clone()
            },
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Test factory for creating mock backends
#[derive(Debug, Default)]
pub struct MockBackendFactory {
    /// Transformation for created backends
    pub style: Option<MockStyle>,
    /// Whether created backends fail to initialize
    pub create_failing_backends: bool,
    /// Whether created backends fail every inference
    pub create_failing_inference: bool,
    /// Whether to fail backend creation entirely
    pub fail_backend_creation: bool,
    /// History shared by every created backend
    pub call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackendFactory {
    /// Create a new mock factory with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory that produces backends failing initialization
    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            create_failing_backends: true,
            ..Self::default()
        }
    }

    /// Create a factory that fails to create backends
    #[must_use]
    pub fn new_creation_failing() -> Self {
        Self {
            fail_backend_creation: true,
            ..Self::default()
        }
    }

    /// Calls recorded across all created backends
    pub fn calls(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>> {
        if self.fail_backend_creation {
            return Err(StylizeError::model_load(
                "Mock factory configured to fail backend creation",
            ));
        }

        let mut backend = MockStyleBackend::with_style(self.style.unwrap_or(MockStyle::Identity))
            .with_call_history(Arc::clone(&self.call_history));
        backend.should_fail_init = self.create_failing_backends;
        backend.should_fail_inference = self.create_failing_inference;
        Ok(Box::new(backend))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}

/// Helper functions for creating test images and fixtures
pub mod test_helpers {
    use crate::models::ModelWeights;
    use image::{DynamicImage, ImageBuffer, Rgb};

    /// Create a gradient test image with specified dimensions
    pub fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            let b = 128;
            Rgb([r, g, b])
        });

        DynamicImage::ImageRgb8(img)
    }

    /// Encode a test image as PNG bytes
    pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        create_test_image(width, height)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Placeholder weights for mock backends
    pub fn mock_weights() -> ModelWeights {
        ModelWeights::from_bytes("mock-style", vec![0u8; 16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_lifecycle() {
        let mut backend = MockStyleBackend::new();
        assert!(!backend.is_initialized());

        let input = Array4::<f32>::from_elem((1, 3, 4, 4), 0.5);
        assert!(backend.infer(&input, false).is_err());

        backend.initialize(&StylizeConfig::default()).unwrap();
        let output = backend.infer(&input, true).unwrap();
        assert_eq!(output, input);

        let history = backend.get_call_history();
        assert_eq!(history.first().map(String::as_str), Some("infer:(1, 3, 4, 4):false"));
        assert!(history.contains(&"initialize".to_string()));
        assert!(history.contains(&"infer:(1, 3, 4, 4):true".to_string()));
    }

    #[test]
    fn test_invert_style() {
        let mut backend = MockStyleBackend::with_style(MockStyle::Invert);
        backend.initialize(&StylizeConfig::default()).unwrap();
        let input = Array4::<f32>::from_elem((1, 3, 2, 2), 0.25);
        let output = backend.infer(&input, false).unwrap();
        assert!(output.iter().all(|v| (*v + 0.25).abs() < f32::EPSILON));
    }

    #[test]
    fn test_failure_modes() {
        let mut failing_init = MockStyleBackend::new_failing_init();
        assert!(failing_init.initialize(&StylizeConfig::default()).is_err());

        let mut failing_inference = MockStyleBackend::new_failing_inference();
        failing_inference.initialize(&StylizeConfig::default()).unwrap();
        let err = failing_inference
            .infer(&Array4::zeros((1, 3, 2, 2)), false)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Inference);
    }

    #[test]
    fn test_factory_modes() {
        let factory = MockBackendFactory::new();
        let backend = factory
            .create_backend(BackendType::Onnx, test_helpers::mock_weights())
            .unwrap();
        assert!(!backend.is_initialized());

        let failing = MockBackendFactory::new_creation_failing();
        assert!(failing
            .create_backend(BackendType::Tract, test_helpers::mock_weights())
            .is_err());

        assert_eq!(factory.available_backends().len(), 2);
    }
}
