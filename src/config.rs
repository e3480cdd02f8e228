//! Configuration types for style transfer operations

use crate::error::{Result, StylizeError};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Default cap on the longer image edge before inference
pub const DEFAULT_MAX_EDGE: u32 = 1024;

/// Spatial granularity the network's down/upsampling stages require
pub const ALIGNMENT: u32 = 32;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration on the given device
    Cuda { device_id: i32 },
    /// Apple Silicon GPU / Neural Engine acceleration
    CoreMl,
}

impl ExecutionProvider {
    /// First CUDA device
    #[must_use]
    pub fn cuda() -> Self {
        Self::Cuda { device_id: 0 }
    }

    /// Whether this provider asks for hardware acceleration
    #[must_use]
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda { device_id } => write!(f, "cuda:{device_id}"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = StylizeError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::cuda()),
            "coreml" => Ok(Self::CoreMl),
            other => {
                if let Some(index) = other.strip_prefix("cuda:") {
                    let device_id = index.parse::<i32>().map_err(|_| {
                        StylizeError::invalid_config(format!("Invalid CUDA device index: {index}"))
                    })?;
                    if device_id < 0 {
                        return Err(StylizeError::config_value_error(
                            "CUDA device index",
                            device_id,
                            ">= 0",
                            Some(0),
                        ));
                    }
                    return Ok(Self::Cuda { device_id });
                }
                Err(StylizeError::invalid_config(format!(
                    "Unknown execution provider: {s}. Supported: auto, cpu, cuda, cuda:N, coreml"
                )))
            },
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// Lossless PNG (default for in-memory results)
    #[default]
    Png,
    /// JPEG with configurable quality
    Jpeg,
    /// Uncompressed BMP
    Bmp,
    /// Lossless TIFF
    Tiff,
    /// Lossless WebP (requires the `webp-support` feature)
    WebP,
}

impl OutputFormat {
    /// Determine the format from a file extension (case-insensitive)
    ///
    /// # Errors
    /// - Extension does not name a supported output format
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            "webp" => Ok(Self::WebP),
            other => Err(StylizeError::unsupported_format(format!(
                "Unsupported output extension '.{other}'. Supported: png, jpg, jpeg, bmp, tif, tiff, webp"
            ))),
        }
    }

    /// Determine the format from a destination path's extension
    ///
    /// # Errors
    /// - Path has no extension or an unsupported one
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let extension = path_ref
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                StylizeError::unsupported_format(format!(
                    "Cannot determine output format: '{}' has no file extension",
                    path_ref.display()
                ))
            })?;
        Self::from_extension(extension)
    }

    /// Canonical file extension (without the dot)
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
        }
    }

    /// Corresponding `image` crate format
    #[must_use]
    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
            Self::WebP => ImageFormat::WebP,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::WebP => "WebP",
        };
        f.write_str(name)
    }
}

/// Configuration for style transfer operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylizeConfig {
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Output format used when no destination path dictates one
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Maximum length of either image edge before inference (downscale only)
    pub max_edge: u32,

    /// Floor the inference size to multiples of 32
    pub align_to_32: bool,

    /// Forwarded to the network's upsampling layers
    pub upsample_align: bool,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

impl Default for StylizeConfig {
    fn default() -> Self {
        Self {
            execution_provider: ExecutionProvider::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            max_edge: DEFAULT_MAX_EDGE,
            align_to_32: true,
            upsample_align: false,
            debug: false,
            intra_threads: 0, // Auto-detect optimal intra-op threads
            inter_threads: 0, // Auto-detect optimal inter-op threads
        }
    }
}

impl StylizeConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::{StylizeConfig, ExecutionProvider, OutputFormat};
    ///
    /// let config = StylizeConfig::builder()
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .output_format(OutputFormat::Jpeg)
    ///     .max_edge(768)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_edge, 768);
    /// ```
    #[must_use]
    pub fn builder() -> StylizeConfigBuilder {
        StylizeConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - `max_edge` of zero
    /// - `max_edge` below 32 while alignment is enabled (every image would collapse)
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(StylizeError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }

        if self.max_edge == 0 {
            return Err(StylizeError::config_value_error(
                "max edge",
                self.max_edge,
                ">= 1",
                Some(DEFAULT_MAX_EDGE),
            ));
        }

        if self.align_to_32 && self.max_edge < ALIGNMENT {
            return Err(StylizeError::config_value_error(
                "max edge",
                self.max_edge,
                ">= 32 when alignment is enabled",
                Some(DEFAULT_MAX_EDGE),
            ));
        }

        Ok(())
    }
}

/// Builder for `StylizeConfig`
#[derive(Debug, Default)]
pub struct StylizeConfigBuilder {
    config: StylizeConfig,
}

impl StylizeConfigBuilder {
    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Set the maximum edge length
    #[must_use]
    pub fn max_edge(mut self, max_edge: u32) -> Self {
        self.config.max_edge = max_edge;
        self
    }

    /// Enable or disable 32-pixel alignment
    #[must_use]
    pub fn align_to_32(mut self, align: bool) -> Self {
        self.config.align_to_32 = align;
        self
    }

    /// Set the upsample alignment flag passed to the network
    #[must_use]
    pub fn upsample_align(mut self, align: bool) -> Self {
        self.config.upsample_align = align;
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both intra and inter threads (inter = threads/2, minimum 1; 0 = auto)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`StylizeConfig::validate`]
    pub fn build(self) -> Result<StylizeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StylizeConfig::default();
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.max_edge, 1024);
        assert!(config.align_to_32);
        assert!(!config.upsample_align);
        assert_eq!(config.jpeg_quality, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let config = StylizeConfig::builder()
            .execution_provider(ExecutionProvider::Cuda { device_id: 1 })
            .output_format(OutputFormat::Tiff)
            .jpeg_quality(75)
            .max_edge(512)
            .align_to_32(false)
            .upsample_align(true)
            .debug(true)
            .num_threads(8)
            .build()
            .unwrap();

        assert_eq!(
            config.execution_provider,
            ExecutionProvider::Cuda { device_id: 1 }
        );
        assert_eq!(config.output_format, OutputFormat::Tiff);
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.max_edge, 512);
        assert!(!config.align_to_32);
        assert!(config.upsample_align);
        assert!(config.debug);
        assert_eq!(config.intra_threads, 8);
        assert_eq!(config.inter_threads, 4);
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = StylizeConfig::builder().jpeg_quality(250).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_validation_rejects_bad_max_edge() {
        assert!(StylizeConfig::builder().max_edge(0).build().is_err());
        assert!(StylizeConfig::builder().max_edge(16).build().is_err());
        // Without alignment a tiny cap is still meaningful
        let config = StylizeConfig::builder()
            .max_edge(16)
            .align_to_32(false)
            .build()
            .unwrap();
        assert_eq!(config.max_edge, 16);
    }

    #[test]
    fn test_manual_validation_failure() {
        let config = StylizeConfig {
            jpeg_quality: 101,
            ..StylizeConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("JPEG quality"));
        assert!(error.to_string().contains("101"));
    }

    #[test]
    fn test_execution_provider_parsing() {
        assert_eq!("auto".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Auto);
        assert_eq!("CPU".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cpu);
        assert_eq!(
            "cuda".parse::<ExecutionProvider>().unwrap(),
            ExecutionProvider::Cuda { device_id: 0 }
        );
        assert_eq!(
            "cuda:2".parse::<ExecutionProvider>().unwrap(),
            ExecutionProvider::Cuda { device_id: 2 }
        );
        assert_eq!("coreml".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::CoreMl);
        assert!("cuda:x".parse::<ExecutionProvider>().is_err());
        assert!("cuda:-1".parse::<ExecutionProvider>().is_err());
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_execution_provider_display_round_trip() {
        for provider in [
            ExecutionProvider::Auto,
            ExecutionProvider::Cpu,
            ExecutionProvider::Cuda { device_id: 3 },
            ExecutionProvider::CoreMl,
        ] {
            let parsed: ExecutionProvider = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert!(!ExecutionProvider::Cpu.is_accelerated());
        assert!(ExecutionProvider::cuda().is_accelerated());
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path("a/b.png").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path("x.JPG").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path("x.jpeg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path("x.bmp").unwrap(), OutputFormat::Bmp);
        assert_eq!(OutputFormat::from_path("x.tif").unwrap(), OutputFormat::Tiff);
        assert_eq!(OutputFormat::from_path("x.webp").unwrap(), OutputFormat::WebP);
        assert!(OutputFormat::from_path("x.gif").is_err());
        assert!(OutputFormat::from_path("noextension").is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = StylizeConfig::builder()
            .execution_provider(ExecutionProvider::Cuda { device_id: 0 })
            .max_edge(640)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let restored: StylizeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
