//! Validation helpers

pub mod model;
pub mod tensor;

pub use model::ModelValidator;
pub use tensor::TensorValidator;
