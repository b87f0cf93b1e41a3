//! Error types for the pdf2podcast library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PodcastError`] — **Fatal**: the run cannot proceed (bad input file,
//!   corrupt PDF, upload failure, merge failure). Returned as
//!   `Err(PodcastError)` from the top-level `generate_*` functions.
//!
//! * [`StageError`] — **Localized**: one page's narration or one line's
//!   synthesis failed. Stored inside [`crate::output::PageResult`] so the
//!   rest of the document still becomes a podcast.
//!
//! The narrator and the speech synthesizer both return
//! `Result<_, StageError>`; the orchestrator decides per stage whether a
//! failure is localized or aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2podcast library.
#[derive(Debug, Error)]
pub enum PodcastError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but are not a PDF.
    #[error("Input is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF")]
    WrongPassword,

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error for a specific page, or the page image could
    /// not be normalised and encoded.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or point PDFIUM_LIB_PATH at an\n\
existing copy (either the library file or the directory holding it).\n"
    )]
    PdfiumBindingFailed(String),

    // ── External services ─────────────────────────────────────────────────
    /// A credential needed by an external service is missing.
    #[error("Missing credential '{name}'.\nSet the {env} environment variable or pass it explicitly.")]
    MissingCredential { name: &'static str, env: &'static str },

    /// Uploading a page image to object storage failed.
    #[error("Upload of '{key}' failed: {detail}")]
    PublishFailed { key: String, detail: String },

    // ── Audio errors ──────────────────────────────────────────────────────
    /// Concatenating the audio clips failed; no output file was produced.
    #[error("Audio merge failed: {detail}")]
    MergeFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output MP3 file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A localized error for one page or one script line.
///
/// The `Display` form is the human-readable message shown to the user in
/// place of the missing script or audio.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The chat-completion call for a page failed or returned no content.
    #[error("Page {page}: narration failed: {detail}")]
    NarrationFailed { page: usize, detail: String },

    /// The TTS call for one script line failed.
    #[error("Page {page}, line {line}: speech synthesis with voice '{voice}' failed: {detail}")]
    SynthesisFailed {
        page: usize,
        line: usize,
        voice: String,
        detail: String,
    },
}

impl StageError {
    /// 1-based page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            StageError::NarrationFailed { page, .. } | StageError::SynthesisFailed { page, .. } => {
                *page
            }
        }
    }
}
