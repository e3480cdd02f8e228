//! Model weights loading and the weights-directory catalog

use crate::{
    error::{Result, StylizeError},
    utils::ModelValidator,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable overriding the default weights directory
pub const WEIGHTS_DIR_ENV: &str = "ANIME_STYLIZE_WEIGHTS_DIR";

/// Styles with a known character, in order of preference
const KNOWN_STYLES: &[(&str, &str)] = &[
    (
        "face_paint_512_v2",
        "Portraits and illustrations, the most balanced style",
    ),
    (
        "face_paint_512_v1",
        "Portraits with coarser, more painterly strokes",
    ),
    ("celeba_distill", "Selfies, fastest of the portrait styles"),
    ("paprika", "Landscapes and architecture with vivid colors"),
];

/// Describe a known style by its model name
#[must_use]
pub fn style_description(name: &str) -> Option<&'static str> {
    KNOWN_STYLES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, description)| *description)
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub description: Option<String>,
    pub size_bytes: usize,
    pub path: Option<PathBuf>,
}

/// Read-only weights buffer shared by every backend session
///
/// Cloning is cheap: the bytes live behind an `Arc` and are read from disk
/// once.
#[derive(Debug, Clone)]
pub struct ModelWeights {
    name: String,
    path: Option<PathBuf>,
    data: Arc<[u8]>,
}

impl ModelWeights {
    /// Load weights from an ONNX file
    ///
    /// # Errors
    /// - `ModelLoad` when the file is missing, empty, not `.onnx` or unreadable
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ModelValidator::validate_weights_path(path)?;

        let data = fs::read(path).map_err(|e| {
            StylizeError::model_load_error_with_context("read", path, &e.to_string(), &[])
        })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        log::debug!(
            "Loaded weights '{}' ({}) from {}",
            name,
            format_size(data.len() as u64),
            path.display()
        );

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            data: Arc::from(data),
        })
    }

    /// Wrap weights that are already in memory
    pub fn from_bytes<S: Into<String>>(name: S, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            path: None,
            data: Arc::from(data),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw ONNX bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Metadata for logging and reports
    #[must_use]
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            description: style_description(&self.name).map(str::to_string),
            size_bytes: self.data.len(),
            path: self.path.clone(),
        }
    }
}

/// One weights file found in a weights directory
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub description: Option<String>,
}

/// Weights directory scanner and model name resolver
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    weights_dir: PathBuf,
}

impl ModelCatalog {
    pub fn new<P: Into<PathBuf>>(weights_dir: P) -> Self {
        Self {
            weights_dir: weights_dir.into(),
        }
    }

    /// Catalog over the default weights directory
    ///
    /// # Errors
    /// - No data directory could be determined for this platform
    pub fn from_default_dir() -> Result<Self> {
        Ok(Self::new(Self::default_weights_dir()?))
    }

    /// Default weights directory
    ///
    /// `ANIME_STYLIZE_WEIGHTS_DIR` takes precedence; otherwise the platform
    /// data directory is used:
    /// - Linux: `~/.local/share/anime-stylize/weights/`
    /// - macOS: `~/Library/Application Support/anime-stylize/weights/`
    /// - Windows: `%APPDATA%/anime-stylize/weights/`
    ///
    /// # Errors
    /// - No data directory could be determined for this platform
    pub fn default_weights_dir() -> Result<PathBuf> {
        if let Ok(dir_override) = std::env::var(WEIGHTS_DIR_ENV) {
            return Ok(PathBuf::from(dir_override));
        }

        Ok(dirs::data_dir()
            .ok_or_else(|| {
                StylizeError::invalid_config(format!(
                    "Failed to determine data directory. Set {WEIGHTS_DIR_ENV} environment variable."
                ))
            })?
            .join("anime-stylize")
            .join("weights"))
    }

    #[must_use]
    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }

    /// List every `.onnx` file in the weights directory, sorted by name
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    /// - The directory exists but cannot be read
    pub fn scan(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();

        if !self.weights_dir.exists() {
            return Ok(entries);
        }

        let dir = fs::read_dir(&self.weights_dir).map_err(|e| {
            StylizeError::file_io_error("read weights directory", &self.weights_dir, &e)
        })?;

        for entry in dir.flatten() {
            let path = entry.path();
            let is_onnx = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
            if !is_onnx || !path.is_file() {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                log::debug!("Skipping weights file with non UTF-8 name: {}", path.display());
                continue;
            };
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);

            entries.push(CatalogEntry {
                description: style_description(&name).map(str::to_string),
                name,
                path,
                size_bytes,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Resolve a model argument to a weights file
    ///
    /// The argument is either a path to an existing file or a model name
    /// looked up as `<weights_dir>/<name>.onnx`.
    ///
    /// # Errors
    /// - `ModelLoad` when nothing matches
    /// - `InvalidConfig` for a malformed model name
    pub fn resolve(&self, model: &str) -> Result<PathBuf> {
        let as_path = Path::new(model);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let looks_like_path = as_path.components().count() > 1
            || as_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
        if looks_like_path {
            return Err(StylizeError::model_load_error_with_context(
                "locate",
                as_path,
                "file does not exist",
                &["check the path"],
            ));
        }

        ModelValidator::validate_model_name(model)?;
        let candidate = self.weights_dir.join(format!("{model}.onnx"));
        if candidate.is_file() {
            return Ok(candidate);
        }

        let available: Vec<String> = self
            .scan()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        let hint = if available.is_empty() {
            format!("place .onnx files in {}", self.weights_dir.display())
        } else {
            format!("available: {}", available.join(", "))
        };

        Err(StylizeError::model_load_error_with_context(
            "locate",
            &candidate,
            &format!("no model named '{model}'"),
            &[hint.as_str()],
        ))
    }

    /// Pick the model to use when none is named
    ///
    /// Prefers the known styles in order, then the first file found.
    ///
    /// # Errors
    /// - `ModelLoad` when the weights directory holds no models
    pub fn default_model(&self) -> Result<PathBuf> {
        let entries = self.scan()?;

        for (known, _) in KNOWN_STYLES {
            if let Some(entry) = entries.iter().find(|entry| entry.name == *known) {
                return Ok(entry.path.clone());
            }
        }

        entries.into_iter().next().map(|entry| entry.path).ok_or_else(|| {
            let env_hint = format!("or set {WEIGHTS_DIR_ENV}");
            StylizeError::model_load_error_with_context(
                "find",
                &self.weights_dir,
                "no .onnx weights found",
                &["pass --model <path>", env_hint.as_str()],
            )
        })
    }
}

/// Format byte size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}
