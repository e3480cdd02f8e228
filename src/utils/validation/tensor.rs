//! Tensor validation utilities
//!
//! Provides centralized validation for tensor shapes, dimensions, and
//! array-related operations.

use crate::error::{Result, StylizeError};
use ndarray::Array4;

/// Validator for tensor operations and shape validation
pub struct TensorValidator;

impl TensorValidator {
    /// Validate tensor shape matches expected dimensions
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(StylizeError::processing(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }

        Ok(())
    }

    /// Validate a style network tensor: batch 1, three channels, non-empty plane
    pub fn validate_style_tensor(tensor: &Array4<f32>) -> Result<()> {
        let (batch, channels, height, width) = tensor.dim();
        if batch != 1 || channels != 3 {
            return Err(StylizeError::processing(format!(
                "Tensor must have shape [1, 3, H, W], got [{}, {}, {}, {}]",
                batch, channels, height, width
            )));
        }
        if height == 0 || width == 0 {
            return Err(StylizeError::processing(format!(
                "Tensor has an empty plane: {}x{}",
                width, height
            )));
        }
        Ok(())
    }

    /// Validate image dimensions are within reasonable bounds
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        const MAX_DIMENSION: u32 = 65535;
        const MIN_DIMENSION: u32 = 1;

        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(StylizeError::invalid_config(format!(
                "Image dimensions too small: {}x{}. Minimum: {}x{}",
                width, height, MIN_DIMENSION, MIN_DIMENSION
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(StylizeError::invalid_config(format!(
                "Image dimensions too large: {}x{}. Maximum: {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }

    /// Validate tensor values are finite and within the expected range
    pub fn validate_tensor_value_range(tensor: &Array4<f32>, min: f32, max: f32) -> Result<()> {
        for value in tensor {
            if !value.is_finite() {
                return Err(StylizeError::processing(
                    "Tensor contains non-finite values (NaN or infinity)",
                ));
            }
            if *value < min || *value > max {
                return Err(StylizeError::processing(format!(
                    "Tensor value {} out of range [{}, {}]",
                    value, min, max
                )));
            }
        }
        Ok(())
    }

    /// Count non-finite values in a network output
    #[must_use]
    pub fn count_non_finite(tensor: &Array4<f32>) -> usize {
        tensor.iter().filter(|v| !v.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_validate_tensor_shape() {
        let tensor = Array::zeros((1, 3, 256, 128));
        assert!(TensorValidator::validate_tensor_shape(&tensor, (1, 3, 256, 128)).is_ok());
        assert!(TensorValidator::validate_tensor_shape(&tensor, (1, 3, 128, 256)).is_err());
        assert!(TensorValidator::validate_tensor_shape(&tensor, (2, 3, 256, 128)).is_err());
    }

    #[test]
    fn test_validate_style_tensor() {
        assert!(TensorValidator::validate_style_tensor(&Array::zeros((1, 3, 32, 32))).is_ok());
        assert!(TensorValidator::validate_style_tensor(&Array::zeros((2, 3, 32, 32))).is_err());
        assert!(TensorValidator::validate_style_tensor(&Array::zeros((1, 1, 32, 32))).is_err());
        assert!(TensorValidator::validate_style_tensor(&Array::zeros((1, 3, 0, 32))).is_err());
    }

    #[test]
    fn test_validate_image_dimensions() {
        assert!(TensorValidator::validate_image_dimensions(1920, 1080).is_ok());
        assert!(TensorValidator::validate_image_dimensions(0, 100).is_err());
        assert!(TensorValidator::validate_image_dimensions(100, 0).is_err());
        assert!(TensorValidator::validate_image_dimensions(70000, 1080).is_err());
    }

    #[test]
    fn test_validate_tensor_value_range() {
        let valid_tensor = Array::from_elem((1, 3, 2, 2), 0.5);
        assert!(TensorValidator::validate_tensor_value_range(&valid_tensor, -1.0, 1.0).is_ok());

        let invalid_tensor = Array::from_elem((1, 3, 2, 2), 1.5);
        assert!(TensorValidator::validate_tensor_value_range(&invalid_tensor, -1.0, 1.0).is_err());

        let nan_tensor = Array::from_elem((1, 3, 2, 2), f32::NAN);
        assert!(TensorValidator::validate_tensor_value_range(&nan_tensor, -1.0, 1.0).is_err());
        assert_eq!(TensorValidator::count_non_finite(&nan_tensor), 12);
    }
}
