//! Image adapter between photographs and a style network
//!
//! The adapter owns the image-side contract of the network: how a photo
//! becomes an input tensor, how the network is invoked, and how its raw
//! output becomes a photo of the original size again. It holds no session
//! state; the backend is passed in per call.

use crate::{
    config::StylizeConfig,
    error::{Result, StylizeError},
    inference::InferenceBackend,
    types::PreparedImage,
    utils::{ImagePostprocessor, ImagePreprocessor, PreprocessingOptions, TensorValidator},
};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use tracing::instrument;

/// Converts images to network tensors and back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageAdapter {
    options: PreprocessingOptions,
}

impl ImageAdapter {
    #[must_use]
    pub fn new(options: PreprocessingOptions) -> Self {
        Self { options }
    }

    /// Adapter using the resize settings of a `StylizeConfig`
    #[must_use]
    pub fn from_config(config: &StylizeConfig) -> Self {
        Self::new(PreprocessingOptions::from(config))
    }

    #[must_use]
    pub fn options(&self) -> &PreprocessingOptions {
        &self.options
    }

    /// Resize and normalize an image into a `(1, 3, nh, nw)` tensor
    ///
    /// # Errors
    /// - `ImageTooSmall` when scaling and alignment leave a zero side
    #[instrument(
        name = "preprocessing",
        skip(self, image),
        fields(width = image.width(), height = image.height())
    )]
    pub fn prepare(&self, image: &DynamicImage) -> Result<PreparedImage> {
        ImagePreprocessor::prepare(image, &self.options)
    }

    /// Turn raw network output into an RGB image of `original_size`
    ///
    /// # Errors
    /// - `Inference` when the output is not a `(1, 3, h, w)` tensor
    #[instrument(name = "postprocessing", skip(self, raw_output))]
    pub fn restore(&self, raw_output: &Array4<f32>, original_size: (u32, u32)) -> Result<RgbImage> {
        ImagePostprocessor::restore(raw_output, original_size)
    }

    /// Run the network once on a prepared tensor
    ///
    /// # Errors
    /// - `Inference` when the backend is not initialized, the call fails,
    ///   or the output is not a `(1, 3, h, w)` tensor
    #[instrument(name = "inference", skip(self, backend, tensor), fields(shape = ?tensor.dim()))]
    pub fn run_inference(
        &self,
        backend: &mut dyn InferenceBackend,
        tensor: &Array4<f32>,
        upsample_align: bool,
    ) -> Result<Array4<f32>> {
        if !backend.is_initialized() {
            return Err(StylizeError::inference("Backend not initialized"));
        }

        let output = backend.infer(tensor, upsample_align).map_err(|e| match e {
            StylizeError::Inference(_) => e,
            other => StylizeError::inference(other.to_string()),
        })?;

        TensorValidator::validate_style_tensor(&output)
            .map_err(|e| StylizeError::inference(format!("Unexpected network output: {e}")))?;

        let non_finite = TensorValidator::count_non_finite(&output);
        if non_finite > 0 {
            log::warn!("⚠️ Network output contains {non_finite} non-finite values");
        }

        Ok(output)
    }

    /// Prepare, run and restore in one call
    ///
    /// # Errors
    /// - Any error of [`prepare`](Self::prepare),
    ///   [`run_inference`](Self::run_inference) or [`restore`](Self::restore)
    ///
    /// # Examples
    /// ```rust,no_run
    /// use anime_stylize::{backends::TractBackend, ImageAdapter, ModelWeights, StylizeConfig};
    /// use anime_stylize::inference::InferenceBackend;
    ///
    /// let weights = ModelWeights::load("paprika.onnx")?;
    /// let mut backend = TractBackend::new(weights);
    /// backend.initialize(&StylizeConfig::default())?;
    ///
    /// let photo = image::open("photo.jpg")?;
    /// let stylized = ImageAdapter::default().stylize(&mut backend, &photo, false)?;
    /// assert_eq!(stylized.dimensions(), (photo.width(), photo.height()));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn stylize(
        &self,
        backend: &mut dyn InferenceBackend,
        image: &DynamicImage,
        upsample_align: bool,
    ) -> Result<RgbImage> {
        let prepared = self.prepare(image)?;
        let raw_output = self.run_inference(backend, &prepared.tensor, upsample_align)?;
        self.restore(&raw_output, prepared.original_size)
    }
}
