//! Per-write scratch directories
//!
//! Every output file is first written into its own uniquely named directory
//! beside the destination and then renamed into place, so a failed write
//! never leaves a truncated file at the destination and concurrent workers
//! never share staging paths.

use crate::error::{Result, StylizeError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix for scratch directory names
pub const SCRATCH_PREFIX: &str = ".anime-stylize-";

/// A uniquely named staging directory, removed on drop
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a scratch directory in the same directory as `destination`
    ///
    /// The destination's parent is created if missing. Staging on the same
    /// filesystem keeps the final rename atomic.
    pub fn for_destination(destination: &Path) -> Result<Self> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        std::fs::create_dir_all(&parent)
            .map_err(|e| StylizeError::file_io_error("create output directory", &parent, &e))?;

        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| StylizeError::file_io_error("create scratch directory", &parent, &e))?;

        log::trace!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Path of the scratch directory
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stage `bytes` in the scratch directory, then move them to `destination`
    ///
    /// Consumes the scratch space; the directory is removed whether or not
    /// the write succeeds.
    pub fn commit(self, destination: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = destination
            .file_name()
            .ok_or_else(|| StylizeError::invalid_config(format!(
                "Output path '{}' has no file name",
                destination.display()
            )))?;
        let staged = self.dir.path().join(file_name);

        std::fs::write(&staged, bytes)
            .map_err(|e| StylizeError::file_io_error("write staged output", &staged, &e))?;
        std::fs::rename(&staged, destination)
            .map_err(|e| StylizeError::file_io_error("move output into place", destination, &e))?;

        let dir_path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| StylizeError::file_io_error("remove scratch directory", &dir_path, &e))?;
        Ok(())
    }
}
