//! Shared utilities for image adaptation, provider handling and validation

pub mod postprocessing;
pub mod preprocessing;
pub mod providers;
pub mod validation;

pub use postprocessing::ImagePostprocessor;
pub use preprocessing::{ImagePreprocessor, PreprocessingOptions};
pub use providers::{ExecutionProviderManager, ProviderInfo};
pub use validation::{ModelValidator, TensorValidator};
