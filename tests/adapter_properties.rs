//! Properties of the image adapter checked across many image sizes
//!
//! Every test drives the public adapter API with a small test network
//! implementing `InferenceBackend`.

mod common;

use anime_stylize::{
    ErrorKind, ImageAdapter, ImagePostprocessor, ImagePreprocessor, PreprocessingOptions,
    StylizeError,
};
use common::{pattern_image, Network, TestBackend};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;

const SIZES: &[(u32, u32)] = &[
    (32, 32),
    (33, 47),
    (64, 2000),
    (100, 100),
    (640, 480),
    (800, 600),
    (1023, 1025),
    (1920, 1080),
    (3000, 200),
];

fn option_grid() -> Vec<PreprocessingOptions> {
    let mut options = Vec::new();
    for max_edge in [64, 256, 1024, 4096] {
        for align_to_32 in [true, false] {
            options.push(PreprocessingOptions {
                max_edge,
                align_to_32,
            });
        }
    }
    options
}

#[test]
fn test_restored_size_equals_original_size() {
    let mut backend = TestBackend::ready(Network::Identity);

    for options in option_grid() {
        let adapter = ImageAdapter::new(options);
        for &(width, height) in SIZES {
            let image = pattern_image(width, height);
            match adapter.stylize(&mut backend, &image, false) {
                Ok(output) => assert_eq!(
                    output.dimensions(),
                    (width, height),
                    "{width}x{height} with {options:?}"
                ),
                Err(e) => assert_eq!(e.kind(), ErrorKind::ImageTooSmall, "{width}x{height}"),
            }
        }
    }
}

#[test]
fn test_never_upscales() {
    for options in option_grid() {
        for &(width, height) in SIZES {
            if let Ok((nw, nh)) = ImagePreprocessor::target_dimensions(width, height, &options) {
                assert!(nw <= width && nh <= height, "{width}x{height} -> {nw}x{nh}");
                assert!(nw.max(nh) <= options.max_edge);
            }
        }
    }
}

#[test]
fn test_aligned_sizes_are_multiples_of_32() {
    for options in option_grid().into_iter().filter(|o| o.align_to_32) {
        for &(width, height) in SIZES {
            if let Ok((nw, nh)) = ImagePreprocessor::target_dimensions(width, height, &options) {
                assert_eq!(nw % 32, 0, "{width}x{height} with {options:?}");
                assert_eq!(nh % 32, 0, "{width}x{height} with {options:?}");
            }
        }
    }
}

#[test]
fn test_tensor_values_stay_in_unit_range() {
    let adapter = ImageAdapter::default();
    for &(width, height) in SIZES {
        let prepared = adapter.prepare(&pattern_image(width, height)).unwrap();
        assert!(prepared
            .tensor
            .iter()
            .all(|v| (-1.0..=1.0).contains(v)));
    }
}

#[test]
fn test_out_of_range_network_output_is_clamped() {
    let adapter = ImageAdapter::default();
    let mut backend = TestBackend::ready(Network::Overdrive);

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(96, 64, Rgb([255, 0, 200])));

    let output = adapter.stylize(&mut backend, &image, false).unwrap();
    assert_eq!(output.dimensions(), (96, 64));
    assert!(output.pixels().all(|p| p.0 == [255, 0, 255]));
}

#[test]
fn test_same_size_restore_is_pixel_identical() {
    let (width, height) = (64, 96);
    let raw = Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
        ((x * 5 + y * 3 + c * 11) % 200) as f32 / 100.0 - 1.0
    });

    let restored = ImagePostprocessor::restore(&raw, (width as u32, height as u32)).unwrap();
    for (x, y, pixel) in restored.enumerate_pixels() {
        for channel in 0..3 {
            let value = raw[[0, channel, y as usize, x as usize]];
            let expected = ((value.clamp(-1.0, 1.0) * 0.5 + 0.5) * 255.0) as u8;
            assert_eq!(pixel[channel], expected, "pixel ({x}, {y}) channel {channel}");
        }
    }
}

#[test]
fn test_photo_800x600_default_settings() {
    let adapter = ImageAdapter::default();
    let mut backend = TestBackend::ready(Network::Invert);
    let image = pattern_image(800, 600);

    let prepared = adapter.prepare(&image).unwrap();
    assert_eq!(prepared.shape(), (1, 3, 576, 800));
    assert_eq!(prepared.original_size, (800, 600));

    let output = adapter.stylize(&mut backend, &image, false).unwrap();
    assert_eq!(output.dimensions(), (800, 600));
    assert_eq!(backend.shapes(), vec![(1, 3, 576, 800)]);
}

#[test]
fn test_large_photo_is_downscaled_then_restored() {
    let adapter = ImageAdapter::default();
    let mut backend = TestBackend::ready(Network::Identity);

    let output = adapter
        .stylize(&mut backend, &pattern_image(4000, 3000), false)
        .unwrap();
    assert_eq!(output.dimensions(), (4000, 3000));
    assert_eq!(backend.shapes(), vec![(1, 3, 768, 1024)]);
}

#[test]
fn test_collapsed_dimension_is_an_explicit_error() {
    let adapter = ImageAdapter::default();
    let mut backend = TestBackend::ready(Network::Identity);

    let err = adapter
        .stylize(&mut backend, &pattern_image(10_000, 40), false)
        .unwrap_err();
    assert!(matches!(
        err,
        StylizeError::ImageTooSmall {
            width: 10_000,
            height: 40,
            target_width: 1024,
            target_height: 0,
        }
    ));
    assert!(backend.shapes().is_empty());
}
