//! Run-scoped scratch directory.
//!
//! Page PNGs and TTS clips for one run live in a single temporary directory
//! that is removed when the [`RunDir`] is dropped, whether the run finished,
//! failed or panicked.

use crate::error::PodcastError;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Temporary directory owned by one podcast run.
#[derive(Debug)]
pub struct RunDir {
    dir: TempDir,
}

impl RunDir {
    /// Create a fresh directory under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>) -> Result<Self, PodcastError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf2podcast-");
        let dir = match parent {
            Some(p) => {
                std::fs::create_dir_all(p).map_err(|e| {
                    PodcastError::Internal(format!("cannot create {}: {e}", p.display()))
                })?;
                builder.tempdir_in(p)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| PodcastError::Internal(format!("cannot create run directory: {e}")))?;

        debug!("Run directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
