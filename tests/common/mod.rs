//! Shared fixtures for integration tests: small style networks and images

#![allow(dead_code)]

use anime_stylize::{
    inference::InferenceBackend, BackendFactory, BackendType, ModelInfo, ModelWeights, Result,
    StylizeConfig, StylizeError,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use instant::Duration;
use ndarray::Array4;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the test network does to its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Returns the input unchanged
    Identity,
    /// Negates every value
    Invert,
    /// Returns values far outside `[-1, 1]`
    Overdrive,
    /// Fails every forward pass
    Broken,
}

/// Backend running a [`Network`] and recording the shapes it saw
pub struct TestBackend {
    network: Network,
    initialized: bool,
    shapes: Arc<Mutex<Vec<(usize, usize, usize, usize)>>>,
}

impl TestBackend {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            initialized: false,
            shapes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn ready(network: Network) -> Self {
        let mut backend = Self::new(network);
        backend.initialize(&StylizeConfig::default()).unwrap();
        backend
    }

    pub fn shapes(&self) -> Vec<(usize, usize, usize, usize)> {
        self.shapes.lock().unwrap().clone()
    }
}

impl InferenceBackend for TestBackend {
    fn initialize(&mut self, _config: &StylizeConfig) -> Result<Option<Duration>> {
        self.initialized = true;
        Ok(None)
    }

    fn infer(&mut self, input: &Array4<f32>, _upsample_align: bool) -> Result<Array4<f32>> {
        self.shapes.lock().unwrap().push(input.dim());
        match self.network {
            Network::Identity => Ok(input.clone()),
            Network::Invert => Ok(input.mapv(|v| -v)),
            Network::Overdrive => Ok(input.mapv(|v| v * 40.0)),
            Network::Broken => Err(StylizeError::inference("test network exploded")),
        }
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: format!("{:?}", self.network),
            description: None,
            size_bytes: 0,
            path: None,
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory handing out [`TestBackend`]s, optionally failing session start-up
pub struct TestFactory {
    pub network: Network,
    pub fail_initialize: bool,
}

impl TestFactory {
    pub fn new(network: Network) -> Arc<Self> {
        Arc::new(Self {
            network,
            fail_initialize: false,
        })
    }
}

struct FailingInit;

impl InferenceBackend for FailingInit {
    fn initialize(&mut self, _config: &StylizeConfig) -> Result<Option<Duration>> {
        Err(StylizeError::model_load("graph has no inputs"))
    }

    fn infer(&mut self, _input: &Array4<f32>, _upsample_align: bool) -> Result<Array4<f32>> {
        Err(StylizeError::inference("not initialized"))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Err(StylizeError::model_load("not initialized"))
    }

    fn is_initialized(&self) -> bool {
        false
    }
}

impl BackendFactory for TestFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _weights: ModelWeights,
    ) -> Result<Box<dyn InferenceBackend>> {
        if self.fail_initialize {
            Ok(Box::new(FailingInit))
        } else {
            Ok(Box::new(TestBackend::new(self.network)))
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}

pub fn test_weights() -> ModelWeights {
    ModelWeights::from_bytes("test-network", b"not really onnx".to_vec())
}

/// Image with a deterministic color pattern
pub fn pattern_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x + y) * 3 % 256) as u8,
        ])
    }))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    pattern_image(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width, height)).unwrap();
    path
}
