//! Core types for style transfer operations

use crate::{
    config::OutputFormat,
    error::Result,
    services::{ImageIOService, OutputFormatHandler},
};
use image::RgbImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Normalized network input produced by the image adapter
///
/// The tensor is NCHW `(1, 3, height, width)` with values in `[-1, 1]`.
/// `original_size` is the `(width, height)` the restored image must have.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub tensor: Array4<f32>,
    pub original_size: (u32, u32),
    pub target_size: (u32, u32),
    /// False when the source already had the target size and was passed through
    pub resampled: bool,
}

impl PreparedImage {
    /// Tensor shape as `(batch, channels, height, width)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.tensor.dim()
    }
}

/// Result of a style transfer operation
#[derive(Debug, Clone)]
pub struct StylizedImage {
    /// The stylized image at the original resolution
    pub image: RgbImage,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Dimensions the network actually ran at
    pub inference_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,

    /// Original input path (for logging purposes)
    pub input_path: Option<String>,
}

impl StylizedImage {
    /// Create a new stylized result
    #[must_use]
    pub fn new(
        image: RgbImage,
        original_dimensions: (u32, u32),
        inference_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            original_dimensions,
            inference_dimensions,
            metadata,
            input_path: None,
        }
    }

    /// Attach the path the input was read from
    #[must_use]
    pub fn with_input_path<S: Into<String>>(mut self, input_path: S) -> Self {
        self.input_path = Some(input_path.into());
        self
    }

    /// Encode the image in the given format
    ///
    /// # Errors
    /// - Encoder failures or a format not compiled into this build
    pub fn to_bytes(&self, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        OutputFormatHandler::encode(&self.image, format, jpeg_quality)
    }

    /// Save to `path` in the given format
    ///
    /// The file appears only once fully written; on failure nothing is left at `path`.
    ///
    /// # Errors
    /// - Encoding or file system failures
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat, jpeg_quality: u8) -> Result<()> {
        let bytes = self.to_bytes(format, jpeg_quality)?;
        ImageIOService::write_atomic(path, &bytes)
    }

    /// Save to `path`, choosing the format from its extension, and record the encode time
    ///
    /// # Errors
    /// - Unsupported destination extension
    /// - Encoding or file system failures
    pub fn save_timed<P: AsRef<Path>>(&mut self, path: P, jpeg_quality: u8) -> Result<()> {
        let path_ref = path.as_ref();
        let format = OutputFormat::from_path(path_ref)?;
        let encode_start = instant::Instant::now();
        self.save(path_ref, format, jpeg_quality)?;
        let encode_ms = encode_start.elapsed().as_millis() as u64;
        self.metadata.timings.image_encode_ms = Some(encode_ms);
        self.metadata.output_format = format.to_string();

        log::info!(
            "Processed: {} -> {} in {:.2}s",
            self.input_path.as_deref().unwrap_or("input"),
            path_ref.display(),
            (self.metadata.timings.total_ms + encode_ms) as f64 / 1000.0
        );
        Ok(())
    }

    /// Image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        let breakdown = t.breakdown_percentages();

        let mut summary = format!(
            "Total: {}ms | Decode: {}ms ({:.1}%) | Preprocess: {}ms ({:.1}%) | Inference: {}ms ({:.1}%) | Postprocess: {}ms ({:.1}%)",
            t.total_ms,
            t.image_decode_ms, breakdown.decode_pct,
            t.preprocessing_ms, breakdown.preprocessing_pct,
            t.inference_ms, breakdown.inference_pct,
            t.postprocessing_ms, breakdown.postprocessing_pct
        );

        if let Some(encode_ms) = t.image_encode_ms {
            summary.push_str(&format!(" | Encode: {encode_ms}ms"));
        }

        summary
    }
}

/// Detailed timing breakdown for one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: u64,

    /// Image loading and decoding
    pub image_decode_ms: u64,

    /// Resize and normalization
    pub preprocessing_ms: u64,

    /// Network forward pass
    pub inference_ms: u64,

    /// Denormalization and resize back to original size
    pub postprocessing_ms: u64,

    /// Final image encoding (if saving to file)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of the total spent in the network
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }

    /// Percentages of the total per phase
    #[must_use]
    pub fn breakdown_percentages(&self) -> TimingBreakdown {
        if self.total_ms == 0 {
            return TimingBreakdown::default();
        }

        let total = self.total_ms as f64;
        TimingBreakdown {
            model_load_pct: (self.model_load_ms as f64 / total) * 100.0,
            decode_pct: (self.image_decode_ms as f64 / total) * 100.0,
            preprocessing_pct: (self.preprocessing_ms as f64 / total) * 100.0,
            inference_pct: (self.inference_ms as f64 / total) * 100.0,
            postprocessing_pct: (self.postprocessing_ms as f64 / total) * 100.0,
            other_pct: (self.other_overhead_ms() as f64 / total) * 100.0,
        }
    }

    /// Time not attributed to any measured phase
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.model_load_ms
            + self.image_decode_ms
            + self.preprocessing_ms
            + self.inference_ms
            + self.postprocessing_ms;
        self.total_ms.saturating_sub(measured)
    }
}

/// Percentage breakdown of timing phases
#[derive(Debug, Clone, Default)]
pub struct TimingBreakdown {
    pub model_load_pct: f64,
    pub decode_pct: f64,
    pub preprocessing_pct: f64,
    pub inference_pct: f64,
    pub postprocessing_pct: f64,
    pub other_pct: f64,
}

/// Metadata about the processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Model used for inference
    pub model_name: String,

    /// Backend that ran the model
    pub backend: String,

    /// Input image format, when known
    pub input_format: String,

    /// Output image format
    pub output_format: String,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(model_name: String) -> Self {
        Self {
            timings: ProcessingTimings::new(),
            model_name,
            backend: "unknown".to_string(),
            input_format: "unknown".to_string(),
            output_format: "PNG".to_string(),
        }
    }
}
