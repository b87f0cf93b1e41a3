//! # pdf2podcast
//!
//! Turn a slide deck PDF into a narrated podcast.
//!
//! Each page is rasterised and published to S3-compatible storage, a
//! vision chat model writes a short spoken script for it, a TTS service
//! reads the script line by line, and all clips are joined into one MP3.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise pages via pdfium (spawn_blocking), normalise size
//!  ├─ 3. Publish    PNG → object storage (public-read) → URL
//!  ├─ 4. Narrate    URL → script (chat completion, one call per page)
//!  ├─ 5. Speak      script line → MP3 clip (TTS, voices rotate per line)
//!  └─ 6. Merge      clips → final_podcast.mp3, strict page/line order
//! ```
//!
//! Pages and lines are processed one at a time. A page whose narration
//! fails keeps the error message in place of its script, and a line whose
//! synthesis fails is skipped; rendering, upload and merge failures abort
//! the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2podcast::{generate_podcast, PodcastConfig, Voice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from OBJECT_STORAGE_*, CLOVA_API_KEY, NAVER_CLIENT_*
//!     let config = pdf2podcast::PodcastConfigBuilder::from_config(PodcastConfig::from_env())
//!         .voices(vec![Voice::Ndain, Voice::Neunwoo])
//!         .build()?;
//!     let output = generate_podcast("deck.pdf", &config).await?;
//!     for page in &output.pages {
//!         println!("page {}: {}", page.page_num, page.image_url);
//!     }
//!     eprintln!("{} ms of audio in {}",
//!         output.podcast.duration_ms,
//!         output.podcast.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2podcast` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2podcast = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Rendering needs a pdfium shared library at runtime. Point
//! `PDFIUM_LIB_PATH` (or [`PodcastConfig::pdfium_library_path`]) at the
//! library file or its directory; otherwise the system library is used.
//! [`podcast_from_images`] skips rendering entirely.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod podcast;
pub mod progress;
pub mod prompts;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChatConfig, PageSelection, PodcastConfig, PodcastConfigBuilder, StorageConfig, TtsConfig,
    Voice,
};
pub use error::{PodcastError, StageError};
pub use output::{
    AudioClip, DocumentMetadata, LineResult, MergedPodcast, PageImage, PageResult, PodcastOutput,
    PodcastStats, PublishedAsset,
};
pub use pipeline::publish::{AssetPublisher, S3Publisher};
pub use podcast::{
    generate_podcast, generate_podcast_from_bytes, generate_podcast_sync, inspect,
    podcast_from_images,
};
pub use progress::{NoopProgressCallback, PodcastProgressCallback, ProgressCallback, SessionStage};
