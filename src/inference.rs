//! Inference backend abstraction

use crate::{config::StylizeConfig, error::Result, models::ModelInfo};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// A backend wraps one session over a style network. The network maps an
/// NCHW tensor in `[-1, 1]` to a tensor of the same layout. Backends are
/// moved onto worker threads by the batch runner, hence the `Send` bound.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time when the backend measured one.
    ///
    /// # Errors
    /// - Weights incompatible with the runtime
    /// - Invalid configuration parameters
    fn initialize(&mut self, config: &StylizeConfig) -> Result<Option<Duration>>;

    /// Run the network on the input tensor
    ///
    /// `upsample_align` is forwarded to networks that take it as a second
    /// input and ignored otherwise.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Network execution failures
    /// - Output tensor with an unexpected layout
    fn infer(&mut self, input: &Array4<f32>, upsample_align: bool) -> Result<Array4<f32>>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model metadata unavailable
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
