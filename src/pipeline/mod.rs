//! Pipeline stages for PDF-to-podcast generation.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped (another storage backend, another TTS vendor) without
//! touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ publish ──▶ narrate ──▶ script ──▶ speech ──▶ merge
//! (path/URL) (pdfium)   (PNG)     (S3 URL)    (chat)     (lines)    (TTS)      (MP3)
//! ```
//!
//! 1. [`input`]  — read the PDF from disk or download it; check the magic
//! 2. [`render`] — rasterise selected pages in `spawn_blocking`, then
//!    [`normalize`] each image to the vision model's size limits
//! 3. [`encode`] — PNG-encode a page into a self-deleting temp file
//! 4. [`publish`] — upload the PNG with public-read access, return its URL
//! 5. [`narrate`] — one chat-completion call per page; replies are cleaned by
//!    [`postprocess`]
//! 6. [`script`] — split the script into utterances and pick each voice
//! 7. [`speech`] — one TTS call per utterance, saved as an MP3 clip
//! 8. [`merge`]  — validate and concatenate clips frame by frame ([`mp3`])

pub mod encode;
pub mod http;
pub mod input;
pub mod merge;
pub mod mp3;
pub mod narrate;
pub mod normalize;
pub mod postprocess;
pub mod publish;
pub mod render;
pub mod script;
pub mod speech;
