//! Progress-callback trait for incremental session events.
//!
//! Inject an [`Arc<dyn PodcastProgressCallback>`] via
//! [`crate::config::PodcastConfigBuilder::progress_callback`] to receive
//! each page's image URL and script, and each line's synthesis outcome, as
//! soon as they are ready — long before the merged podcast exists.
//!
//! # Example
//!
//! ```rust
//! use pdf2podcast::{PodcastConfig, PodcastProgressCallback};
//! use std::sync::Arc;
//!
//! struct PrintScripts;
//!
//! impl PodcastProgressCallback for PrintScripts {
//!     fn on_script_ready(&self, page_num: usize, _total_pages: usize, script: &str) {
//!         eprintln!("--- page {page_num} ---\n{script}");
//!     }
//! }
//!
//! let config = PodcastConfig::builder()
//!     .progress_callback(Arc::new(PrintScripts) as Arc<dyn PodcastProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::Voice;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Where a session currently is.
///
/// A run moves linearly through these stages; `Publishing`, `Narrating`
/// and `Synthesizing` repeat per page (and per line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStage {
    Idle,
    Uploaded,
    Rasterizing,
    Publishing { page: usize },
    Narrating { page: usize },
    Synthesizing { page: usize, line: usize },
    Merging,
    Done,
    Errored,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStage::Idle => f.write_str("idle"),
            SessionStage::Uploaded => f.write_str("uploaded"),
            SessionStage::Rasterizing => f.write_str("rasterizing"),
            SessionStage::Publishing { page } => write!(f, "publishing page {page}"),
            SessionStage::Narrating { page } => write!(f, "narrating page {page}"),
            SessionStage::Synthesizing { page, line } => {
                write!(f, "synthesizing page {page} line {line}")
            }
            SessionStage::Merging => f.write_str("merging"),
            SessionStage::Done => f.write_str("done"),
            SessionStage::Errored => f.write_str("errored"),
        }
    }
}

/// Called by the session as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The session is sequential, so calls never overlap.
pub trait PodcastProgressCallback: Send + Sync {
    /// Called on every stage transition.
    fn on_stage(&self, stage: &SessionStage) {
        let _ = stage;
    }

    /// Called once the document is rasterised and the page count is known.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page image has been uploaded.
    fn on_page_published(&self, page_num: usize, total_pages: usize, url: &str) {
        let _ = (page_num, total_pages, url);
    }

    /// Called when a page's narration script is available.
    fn on_script_ready(&self, page_num: usize, total_pages: usize, script: &str) {
        let _ = (page_num, total_pages, script);
    }

    /// Called when narration for a page failed; `error` is shown in place of the script.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called after one script line has been synthesised.
    fn on_line_synthesized(&self, page_num: usize, line: usize, voice: Voice) {
        let _ = (page_num, line, voice);
    }

    /// Called when one script line failed to synthesise (the line is skipped).
    fn on_line_error(&self, page_num: usize, line: usize, error: &str) {
        let _ = (page_num, line, error);
    }

    /// Called once the merged podcast has been written.
    fn on_merge_complete(&self, path: &Path, duration_ms: u64) {
        let _ = (path, duration_ms);
    }

    /// Called once after all pages have been attempted and merged.
    ///
    /// # Arguments
    /// * `total_pages`   — pages in the run
    /// * `narrated`      — pages that received a script
    /// * `clip_count`    — audio clips in the merged podcast
    fn on_run_complete(&self, total_pages: usize, narrated: usize, clip_count: usize) {
        let _ = (total_pages, narrated, clip_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PodcastProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PodcastConfig`].
pub type ProgressCallback = Arc<dyn PodcastProgressCallback>;
