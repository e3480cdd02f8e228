//! Error types for style transfer operations

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Result type alias for style transfer operations
pub type Result<T> = std::result::Result<T, StylizeError>;

/// Error types for style transfer operations
///
/// The first four variants are the failure modes a caller is expected to
/// distinguish: the weights could not be loaded, the input could not be
/// decoded, the input collapses to nothing after alignment, or the network
/// call itself failed.
#[derive(Error, Debug)]
pub enum StylizeError {
    /// Weights file unreadable or incompatible with the inference runtime
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Input bytes are not a decodable image
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// Post-alignment target dimensions collapsed to zero
    #[error(
        "Image too small: {width}x{height} maps to {target_width}x{target_height} after scaling and alignment"
    )]
    ImageTooSmall {
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    /// The network forward pass failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Tensor conversion or encoding errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serializable discriminant of [`StylizeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ModelLoad,
    ImageDecode,
    ImageTooSmall,
    Inference,
    Io,
    InvalidConfig,
    UnsupportedFormat,
    Processing,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ModelLoad => "ModelLoadError",
            Self::ImageDecode => "ImageDecodeError",
            Self::ImageTooSmall => "ImageTooSmall",
            Self::Inference => "InferenceError",
            Self::Io => "IoError",
            Self::InvalidConfig => "InvalidConfig",
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::Processing => "ProcessingError",
            Self::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

impl StylizeError {
    /// Kind of this error, for reporting and matching without the payload
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelLoad(_) => ErrorKind::ModelLoad,
            Self::ImageDecode(_) => ErrorKind::ImageDecode,
            Self::ImageTooSmall { .. } => ErrorKind::ImageTooSmall,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Processing(_) => ErrorKind::Processing,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new image decode error
    pub fn image_decode<S: Into<String>>(msg: S) -> Self {
        Self::ImageDecode(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create image decode error with path and format context
    pub fn image_decode_error<P: AsRef<Path>>(path: P, error: &image::ImageError) -> Self {
        let path_ref = path.as_ref();
        let extension = path_ref
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        Self::ImageDecode(format!(
            "Failed to decode image '{}' (extension: {}): {}. Supported formats: JPEG, PNG, BMP, TIFF",
            path_ref.display(),
            extension,
            error
        ))
    }

    /// Create model load error with troubleshooting suggestions
    pub fn model_load_error_with_context<P: AsRef<Path>>(
        operation: &str,
        weights_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::ModelLoad(format!(
            "Failed to {} weights '{}': {}.{}",
            operation,
            weights_path.as_ref().display(),
            error,
            suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }
}
