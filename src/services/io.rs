//! Image I/O operations service
//!
//! This module separates file I/O operations from the processing logic,
//! making the pipeline testable without touching the filesystem.

use crate::{
    error::{Result, StylizeError},
    services::scratch::ScratchSpace,
};
use image::DynamicImage;
use std::path::Path;

/// Input extensions accepted for directory scans and format checks
#[cfg(feature = "webp-support")]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];
/// Input extensions accepted for directory scans and format checks
#[cfg(not(feature = "webp-support"))]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is detected from the extension first, falling back to
    /// content sniffing when the extension is missing or wrong.
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `ImageDecode` when the contents are not a decodable image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use anime_stylize::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("photo.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(StylizeError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    StylizeError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data)
                    .map_err(|content_err| StylizeError::image_decode_error(path_ref, &content_err))
            },
        }
    }

    /// Load an image from bytes
    ///
    /// # Errors
    /// `ImageDecode` when the bytes are empty or not a decodable image.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(StylizeError::image_decode("Image data is empty"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            StylizeError::image_decode(format!("Failed to decode image from bytes: {e}"))
        })
    }

    /// Load an image from an async reader
    ///
    /// # Examples
    /// ```rust,no_run
    /// use anime_stylize::services::ImageIOService;
    /// use tokio::fs::File;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let file = File::open("photo.jpg").await?;
    /// let image = ImageIOService::load_from_reader(file).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
    ) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::load_from_bytes(&buffer)
    }

    /// Write encoded bytes to `path` through a fresh scratch directory
    ///
    /// The destination either receives the complete file or is left
    /// untouched.
    pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        ScratchSpace::for_destination(path_ref)?.commit(path_ref, bytes)?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }

    /// Check if a file path has a supported image extension
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::services::ImageIOService;
    ///
    /// assert!(ImageIOService::is_supported_format("photo.JPG"));
    /// assert!(!ImageIOService::is_supported_format("notes.txt"));
    /// ```
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext_lower = ext.to_lowercase();
                SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str())
            })
    }
}
