//! Result types produced by a podcast run.

use crate::config::Voice;
use crate::error::StageError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A rasterised, size-normalised page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Logical file name used when publishing the page.
    pub fn file_name(&self) -> String {
        format!("page_{}.png", self.page_num)
    }
}

/// A page image that has been uploaded to the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedAsset {
    /// Publicly fetchable URL.
    pub url: String,
    /// Object key inside the bucket.
    pub key: String,
}

/// A synthesised clip for one script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub path: PathBuf,
    pub voice: Voice,
    pub page_num: usize,
    /// 1-indexed line within the page's script.
    pub line: usize,
}

/// Outcome for one script line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineResult {
    /// 1-indexed line within the page's script.
    pub line: usize,
    pub voice: Voice,
    /// Text sent to the TTS provider (speaker label removed).
    pub text: String,
    /// `None` when the clip was synthesised.
    pub error: Option<StageError>,
}

/// Result for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Public URL of the page image.
    pub image_url: String,
    /// Narration script. Empty when narration failed.
    pub script: String,
    /// Per-line synthesis outcomes, in script order.
    pub lines: Vec<LineResult>,
    /// Wall-clock time spent on narration and synthesis for this page.
    pub duration_ms: u64,
    /// Narration error, if any.
    pub error: Option<StageError>,
}

impl PageResult {
    /// Text to show for this page: the script, or the error message in its place.
    pub fn display_text(&self) -> String {
        match &self.error {
            Some(e) => e.to_string(),
            None => self.script.clone(),
        }
    }

    /// Number of lines that produced audio.
    pub fn synthesized_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.error.is_none()).count()
    }
}

/// The merged podcast file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPodcast {
    pub path: PathBuf,
    /// Number of clips concatenated.
    pub clip_count: usize,
    /// Total playing time in milliseconds.
    pub duration_ms: u64,
    pub size_bytes: u64,
}

impl MergedPodcast {
    /// MIME type to offer the file with.
    pub const MIME_TYPE: &'static str = "audio/mp3";
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcastStats {
    pub total_pages: usize,
    pub narrated_pages: usize,
    pub failed_pages: usize,
    pub synthesized_lines: usize,
    pub failed_lines: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    /// Playing time of the merged podcast.
    pub podcast_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastOutput {
    pub pages: Vec<PageResult>,
    pub podcast: MergedPodcast,
    pub stats: PodcastStats,
}

impl PodcastOutput {
    /// Published image URLs in page order.
    pub fn image_urls(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.image_url.as_str()).collect()
    }
}

/// Document metadata, available without narrating anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}
