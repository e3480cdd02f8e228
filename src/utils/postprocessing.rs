//! Image postprocessing for style networks
//!
//! Converts raw network output back into an RGB image at the original
//! resolution.

use crate::{
    error::{Result, StylizeError},
    utils::TensorValidator,
};
use image::{Rgb, RgbImage};
use ndarray::{Array3, Array4, ArrayView3};

/// Sampling position along one axis for half-pixel bilinear resizing
#[derive(Debug, Clone, Copy)]
struct AxisSample {
    lower: usize,
    upper: usize,
    weight: f32,
}

/// Shared image postprocessing utilities
pub struct ImagePostprocessor;

impl ImagePostprocessor {
    /// Restore a stylized image from raw network output
    ///
    /// Values are clamped to `[-1, 1]` and mapped via `x * 0.5 + 0.5`, resized
    /// bilinearly to `original_size` and converted to 8-bit by truncating
    /// `v * 255`.
    ///
    /// # Errors
    /// - Output tensor is not `(1, 3, h, w)` with non-zero `h` and `w`
    /// - `original_size` has a zero side
    pub fn restore(raw_output: &Array4<f32>, original_size: (u32, u32)) -> Result<RgbImage> {
        TensorValidator::validate_style_tensor(raw_output)
            .map_err(|e| StylizeError::inference(format!("Unexpected network output: {e}")))?;
        let (out_width, out_height) = original_size;
        if out_width == 0 || out_height == 0 {
            return Err(StylizeError::processing(format!(
                "Cannot restore to {out_width}x{out_height}"
            )));
        }

        let denormalized = Self::denormalize(raw_output);
        let (_, in_height, in_width) = denormalized.dim();

        let resized = if (in_width, in_height) == (out_width as usize, out_height as usize) {
            denormalized
        } else {
            log::debug!(
                "Restoring {}x{} -> {}x{}",
                in_width,
                in_height,
                out_width,
                out_height
            );
            Self::resize_bilinear(denormalized.view(), out_width as usize, out_height as usize)
        };

        Ok(Self::tensor_to_image(&resized))
    }

    /// Clamp to `[-1, 1]` and map into `[0, 1]`, dropping the batch axis
    fn denormalize(raw_output: &Array4<f32>) -> Array3<f32> {
        raw_output
            .index_axis(ndarray::Axis(0), 0)
            .mapv(|v| v.clamp(-1.0, 1.0) * 0.5 + 0.5)
    }

    /// Bilinear resize with half-pixel centers and no corner alignment
    ///
    /// Matches the common deep-learning definition: for destination index
    /// `d`, the source coordinate is `(d + 0.5) * in / out - 0.5`, clamped
    /// at zero.
    #[must_use]
    pub fn resize_bilinear(input: ArrayView3<'_, f32>, out_width: usize, out_height: usize) -> Array3<f32> {
        let (channels, in_height, in_width) = input.dim();
        let x_samples = Self::axis_samples(in_width, out_width);
        let y_samples = Self::axis_samples(in_height, out_height);

        let mut output = Array3::<f32>::zeros((channels, out_height, out_width));

        #[allow(clippy::indexing_slicing)]
        // Safe: sample indices are clamped to the input extent
        for c in 0..channels {
            for (oy, ys) in y_samples.iter().enumerate() {
                for (ox, xs) in x_samples.iter().enumerate() {
                    let top = input[[c, ys.lower, xs.lower]] * (1.0 - xs.weight)
                        + input[[c, ys.lower, xs.upper]] * xs.weight;
                    let bottom = input[[c, ys.upper, xs.lower]] * (1.0 - xs.weight)
                        + input[[c, ys.upper, xs.upper]] * xs.weight;
                    output[[c, oy, ox]] = top * (1.0 - ys.weight) + bottom * ys.weight;
                }
            }
        }

        output
    }

    fn axis_samples(in_len: usize, out_len: usize) -> Vec<AxisSample> {
        let scale = in_len as f32 / out_len as f32;
        let last = in_len.saturating_sub(1);

        (0..out_len)
            .map(|dst| {
                let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
                let lower = (src.floor() as usize).min(last);
                let upper = if lower < last { lower + 1 } else { lower };
                AxisSample {
                    lower,
                    upper,
                    weight: src - lower as f32,
                }
            })
            .collect()
    }

    /// Convert a `(3, h, w)` tensor in `[0, 1]` to RGB8
    fn tensor_to_image(tensor: &Array3<f32>) -> RgbImage {
        let (_, height, width) = tensor.dim();
        let to_u8 = |v: f32| (v * 255.0).clamp(0.0, 255.0) as u8;

        #[allow(clippy::indexing_slicing)]
        // Safe: pixel coordinates come from the tensor's own extent
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([
                to_u8(tensor[[0, y, x]]),
                to_u8(tensor[[1, y, x]]),
                to_u8(tensor[[2, y, x]]),
            ])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_same_size_maps_values() {
        let mut raw = Array4::<f32>::zeros((1, 3, 2, 2));
        raw[[0, 0, 0, 0]] = -1.0;
        raw[[0, 1, 0, 0]] = 1.0;
        raw[[0, 2, 0, 0]] = 0.0;
        raw[[0, 0, 1, 1]] = 5.0; // clamped to 1.0
        raw[[0, 1, 1, 1]] = -3.0; // clamped to -1.0

        let image = ImagePostprocessor::restore(&raw, (2, 2)).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 127]);
        assert_eq!(image.get_pixel(1, 1).0[0], 255);
        assert_eq!(image.get_pixel(1, 1).0[1], 0);
    }

    #[test]
    fn test_restore_resizes_to_original() {
        let raw = Array4::<f32>::from_elem((1, 3, 576, 768), 0.3);
        let image = ImagePostprocessor::restore(&raw, (800, 600)).unwrap();
        assert_eq!(image.dimensions(), (800, 600));
        // Constant input stays constant: (0.3 * 0.5 + 0.5) * 255 = 165.75
        assert!(image.pixels().all(|p| p.0 == [165, 165, 165]));
    }

    #[test]
    fn test_bilinear_half_pixel_upscale() {
        // 1x2 -> 1x4 along width: source values 0 and 1
        let mut input = Array3::<f32>::zeros((1, 1, 2));
        input[[0, 0, 1]] = 1.0;
        let output = ImagePostprocessor::resize_bilinear(input.view(), 4, 1);
        let values: Vec<f32> = output.iter().copied().collect();
        let expected = [0.0, 0.25, 0.75, 1.0];
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-6, "got {values:?}");
        }
    }

    #[test]
    fn test_bilinear_downscale_averages() {
        // 4 -> 2 samples at source 0.5 and 2.5
        let input = Array3::from_shape_vec((1, 1, 4), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let output = ImagePostprocessor::resize_bilinear(input.view(), 2, 1);
        assert!((output[[0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((output[[0, 0, 1]] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_restore_rejects_bad_layout() {
        let raw = Array4::<f32>::zeros((1, 1, 8, 8));
        let err = ImagePostprocessor::restore(&raw, (8, 8)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Inference);
    }

    #[test]
    fn test_restore_truncates() {
        // 0.5 * 0.5 + 0.5 = 0.75 -> 191.25 -> 191
        let raw = Array4::<f32>::from_elem((1, 3, 1, 1), 0.5);
        let image = ImagePostprocessor::restore(&raw, (1, 1)).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [191, 191, 191]);
    }
}
