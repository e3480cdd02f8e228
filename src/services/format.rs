//! Output format handling service
//!
//! Keeps encoder selection and quality handling out of the processing code.

use crate::{
    config::OutputFormat,
    error::{Result, StylizeError},
};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use std::io::Cursor;

/// Service for encoding stylized images
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGB image in the given format
    ///
    /// `jpeg_quality` only applies to JPEG; the other formats are lossless.
    ///
    /// # Errors
    /// - Format not compiled into this build (WebP without `webp-support`)
    /// - Encoder failures
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbImage;
    ///
    /// let image = RgbImage::new(16, 16);
    /// let bytes = OutputFormatHandler::encode(&image, OutputFormat::Png, 90)?;
    /// assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(image: &RgbImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        if !Self::is_available(format) {
            return Err(StylizeError::unsupported_format(format!(
                "{format} output requires the webp-support feature"
            )));
        }

        let mut buffer = Cursor::new(Vec::new());
        match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.min(100));
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| StylizeError::processing(format!("Failed to encode JPEG: {e}")))?;
            },
            OutputFormat::Png | OutputFormat::Bmp | OutputFormat::Tiff | OutputFormat::WebP => {
                image.write_to(&mut buffer, format.image_format()).map_err(|e| {
                    StylizeError::processing(format!("Failed to encode {format}: {e}"))
                })?;
            },
        }

        Ok(buffer.into_inner())
    }

    /// Whether this build can encode the format
    #[must_use]
    pub fn is_available(format: OutputFormat) -> bool {
        match format {
            OutputFormat::WebP => cfg!(feature = "webp-support"),
            OutputFormat::Png | OutputFormat::Jpeg | OutputFormat::Bmp | OutputFormat::Tiff => true,
        }
    }

    /// Get the appropriate file extension for a given output format
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        format.extension()
    }

    /// Get the recommended quality settings for a format
    ///
    /// Returns `(default, min, max)`, or `None` for lossless formats.
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_quality_range(OutputFormat::Jpeg), Some((90, 0, 100)));
    /// assert_eq!(OutputFormatHandler::get_quality_range(OutputFormat::Png), None);
    /// ```
    #[must_use]
    pub fn get_quality_range(format: OutputFormat) -> Option<(u8, u8, u8)> {
        match format {
            OutputFormat::Jpeg => Some((90, 0, 100)),
            OutputFormat::Png | OutputFormat::Bmp | OutputFormat::Tiff | OutputFormat::WebP => None,
        }
    }
}
