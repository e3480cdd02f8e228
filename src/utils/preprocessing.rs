//! Image preprocessing for style networks
//!
//! Turns an arbitrary RGB image into the NCHW tensor a style network consumes:
//! the longest edge is capped at `max_edge` (never upscaled), both sides are
//! optionally floored to a multiple of 32, and each channel is mapped into
//! `[-1, 1]`.

use crate::{
    config::{StylizeConfig, ALIGNMENT, DEFAULT_MAX_EDGE},
    error::{Result, StylizeError},
    types::PreparedImage,
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessingOptions {
    /// Longest edge allowed before downscaling
    pub max_edge: u32,
    /// Floor both target sides to a multiple of 32
    pub align_to_32: bool,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            align_to_32: true,
        }
    }
}

impl From<&StylizeConfig> for PreprocessingOptions {
    fn from(config: &StylizeConfig) -> Self {
        Self {
            max_edge: config.max_edge,
            align_to_32: config.align_to_32,
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Compute the `(width, height)` the network runs at
    ///
    /// `scale = min(max_edge / width, max_edge / height, 1.0)` in `f64`, and
    /// each side becomes `floor(side * scale)`. The floating-point rounding
    /// is deliberate: `1122x841` scales to `1023x767`, not `1024x767`.
    ///
    /// # Errors
    /// - `ImageTooSmall` when either side is zero after scaling and alignment
    pub fn target_dimensions(
        width: u32,
        height: u32,
        options: &PreprocessingOptions,
    ) -> Result<(u32, u32)> {
        let max_edge = f64::from(options.max_edge);
        let scale = (max_edge / f64::from(width))
            .min(max_edge / f64::from(height))
            .min(1.0);

        let mut target_width = (f64::from(width) * scale).floor() as u32;
        let mut target_height = (f64::from(height) * scale).floor() as u32;

        if options.align_to_32 {
            target_width = target_width / ALIGNMENT * ALIGNMENT;
            target_height = target_height / ALIGNMENT * ALIGNMENT;
        }

        if target_width == 0 || target_height == 0 {
            return Err(StylizeError::ImageTooSmall {
                width,
                height,
                target_width,
                target_height,
            });
        }

        Ok((target_width, target_height))
    }

    /// Prepare an image for inference
    ///
    /// The image is converted to RGB, resized with a Lanczos3 filter when the
    /// target size differs from the source, and normalized via `v / 127.5 - 1`.
    ///
    /// # Errors
    /// - `ImageTooSmall` when the target size collapses to zero
    pub fn prepare(image: &DynamicImage, options: &PreprocessingOptions) -> Result<PreparedImage> {
        let rgb_image = image.to_rgb8();
        let original_size = rgb_image.dimensions();
        let (target_width, target_height) =
            Self::target_dimensions(original_size.0, original_size.1, options)?;

        let resampled = (target_width, target_height) != original_size;
        let tensor = if resampled {
            log::debug!(
                "Resizing {}x{} -> {}x{}",
                original_size.0,
                original_size.1,
                target_width,
                target_height
            );
            let resized = image::imageops::resize(
                &rgb_image,
                target_width,
                target_height,
                FilterType::Lanczos3,
            );
            Self::image_to_tensor(&resized)
        } else {
            Self::image_to_tensor(&rgb_image)
        };

        Ok(PreparedImage {
            tensor,
            original_size,
            target_size: (target_width, target_height),
            resampled,
        })
    }

    /// Convert RGB pixels to a normalized NCHW tensor
    #[must_use]
    pub fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match image size
        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = f32::from(pixel[channel]) / 127.5 - 1.0;
            }
        }

        tensor
    }
}
