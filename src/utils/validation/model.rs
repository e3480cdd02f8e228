//! Model validation utilities
//!
//! Checks weights files and model names before any runtime sees them.

use crate::error::{Result, StylizeError};
use std::path::Path;

/// Validator for weights files and model names
pub struct ModelValidator;

impl ModelValidator {
    /// Validate that a weights path points at a readable, non-empty ONNX file
    pub fn validate_weights_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(StylizeError::model_load_error_with_context(
                "locate",
                path,
                "file does not exist",
                &[
                    "check the path",
                    "use --list-models to see available styles",
                ],
            ));
        }

        if !path.is_file() {
            return Err(StylizeError::model_load_error_with_context(
                "read",
                path,
                "not a regular file",
                &[],
            ));
        }

        if path.extension().and_then(|s| s.to_str()) != Some("onnx") {
            return Err(StylizeError::model_load_error_with_context(
                "read",
                path,
                "expected an .onnx file",
                &["export the weights to ONNX first"],
            ));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| StylizeError::model_load_error_with_context("stat", path, &e.to_string(), &[]))?;
        if metadata.len() == 0 {
            return Err(StylizeError::model_load_error_with_context(
                "read",
                path,
                "file is empty",
                &[],
            ));
        }

        Ok(())
    }

    /// Validate a model name used for lookup in a weights directory
    pub fn validate_model_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(StylizeError::invalid_config("Model name cannot be empty"));
        }

        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(StylizeError::invalid_config(format!(
                "Invalid characters in model name: {}",
                name
            )));
        }

        Ok(())
    }
}
