//! Session orchestration: one document in, one podcast out.
//!
//! A run walks the pages strictly in order. For each page it publishes the
//! image, narrates it and synthesizes the script line by line, reporting
//! every result through the progress callback as soon as it exists. Only
//! then are all clips merged, in (page, line) order.
//!
//! ## Failure policy
//!
//! | Stage | On failure |
//! |-------|------------|
//! | input / rasterize | run aborts |
//! | publish | run aborts |
//! | narrate | page keeps the error text in place of its script, run continues |
//! | synthesize | line is skipped, run continues |
//! | merge | run aborts, no output file |

use crate::config::PodcastConfig;
use crate::error::PodcastError;
use crate::output::{
    AudioClip, DocumentMetadata, LineResult, PageImage, PageResult, PodcastOutput, PodcastStats,
};
use crate::pipeline::http::http_client;
use crate::pipeline::narrate::Narrator;
use crate::pipeline::normalize::normalize_image;
use crate::pipeline::publish::{AssetPublisher, S3Publisher};
use crate::pipeline::script::{assign_voice, split_lines};
use crate::pipeline::speech::SpeechSynthesizer;
use crate::pipeline::{encode, input, merge, render};
use crate::progress::{PodcastProgressCallback, SessionStage};
use crate::workspace::RunDir;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Turn a PDF file or URL into a narrated podcast.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Run configuration
///
/// # Returns
/// `Ok(PodcastOutput)` once the merged MP3 has been written, even if some
/// pages or lines failed (check `output.stats`).
///
/// # Errors
/// Returns `Err(PodcastError)` only for fatal errors: unreadable input,
/// rasterisation failure, missing credentials, upload failure or merge
/// failure.
pub async fn generate_podcast(
    input_str: impl AsRef<str>,
    config: &PodcastConfig,
) -> Result<PodcastOutput, PodcastError> {
    let input_str = input_str.as_ref();
    info!("Starting podcast: {}", input_str);

    let session = Session::new(config);
    let result = async {
        let bytes = input::load_pdf(input_str, config.download_timeout_secs).await?;
        session.run_pdf(bytes).await
    }
    .await;
    session.finish(result)
}

/// Turn PDF bytes held in memory into a podcast.
///
/// Useful when the document comes from an upload or a database rather than
/// a file on disk; nothing is staged on disk before rendering.
pub async fn generate_podcast_from_bytes(
    bytes: impl Into<Vec<u8>>,
    config: &PodcastConfig,
) -> Result<PodcastOutput, PodcastError> {
    let bytes = bytes.into();
    let session = Session::new(config);
    let result = async {
        input::ensure_pdf(&bytes, "<memory>")?;
        session.run_pdf(bytes).await
    }
    .await;
    session.finish(result)
}

/// Synchronous wrapper around [`generate_podcast`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_podcast_sync(
    input_str: impl AsRef<str>,
    config: &PodcastConfig,
) -> Result<PodcastOutput, PodcastError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PodcastError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_podcast(input_str, config))
}

/// Turn already-rendered slide images into a podcast.
///
/// Images are numbered 1..N in the order given, filtered by
/// `config.pages` and normalised exactly like rendered PDF pages. No
/// pdfium library is needed.
pub async fn podcast_from_images(
    images: Vec<DynamicImage>,
    config: &PodcastConfig,
) -> Result<PodcastOutput, PodcastError> {
    let session = Session::new(config);
    let result = async {
        session.enter(SessionStage::Uploaded);
        session.enter(SessionStage::Rasterizing);
        let start = Instant::now();
        let total = images.len();
        let selected = config.pages.to_indices(total);
        if selected.is_empty() {
            return Err(PodcastError::PageOutOfRange { page: 0, total });
        }
        let pages: Vec<PageImage> = images
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| selected.binary_search(idx).is_ok())
            .map(|(idx, img)| PageImage {
                page_num: idx + 1,
                image: normalize_image(img),
            })
            .collect();
        let render_ms = start.elapsed().as_millis() as u64;
        session.run_pages(pages, render_ms).await
    }
    .await;
    session.finish(result)
}

/// Read PDF metadata without rendering, publishing or calling any API.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &PodcastConfig,
) -> Result<DocumentMetadata, PodcastError> {
    let bytes = input::load_pdf(input_str.as_ref(), config.download_timeout_secs).await?;
    render::extract_metadata(bytes, config).await
}

// ── Session ──────────────────────────────────────────────────────────────

/// External services a run talks to, plus its scratch directory.
struct Services {
    run_dir: RunDir,
    publisher: Arc<dyn AssetPublisher>,
    narrator: Narrator,
    synthesizer: SpeechSynthesizer,
}

/// One run over one document.
struct Session<'a> {
    config: &'a PodcastConfig,
    started: Instant,
}

impl<'a> Session<'a> {
    fn new(config: &'a PodcastConfig) -> Self {
        let session = Self {
            config,
            started: Instant::now(),
        };
        session.enter(SessionStage::Idle);
        session
    }

    fn callback(&self) -> Option<&dyn PodcastProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    fn enter(&self, stage: SessionStage) {
        debug!("Stage: {}", stage);
        if let Some(cb) = self.callback() {
            cb.on_stage(&stage);
        }
    }

    /// Report a fatal error as the `Errored` stage before handing it back.
    fn finish(&self, result: Result<PodcastOutput, PodcastError>) -> Result<PodcastOutput, PodcastError> {
        if let Err(ref e) = result {
            warn!("Run aborted: {}", e);
            self.enter(SessionStage::Errored);
        }
        result
    }

    async fn run_pdf(&self, bytes: Vec<u8>) -> Result<PodcastOutput, PodcastError> {
        self.enter(SessionStage::Uploaded);
        self.enter(SessionStage::Rasterizing);
        let start = Instant::now();
        let pages = render::rasterize(bytes, self.config).await?;
        let render_ms = start.elapsed().as_millis() as u64;
        info!("Rendered {} pages in {}ms", pages.len(), render_ms);
        self.run_pages(pages, render_ms).await
    }

    /// Build every service up front so a missing credential fails the run
    /// before the first upload.
    async fn services(&self) -> Result<Services, PodcastError> {
        let run_dir = RunDir::create(self.config.work_dir.as_deref())?;
        let publisher = resolve_publisher(self.config).await?;
        let client = http_client(self.config.api_timeout_secs)?;
        let narrator = Narrator::new(self.config, client.clone())?;
        let synthesizer = SpeechSynthesizer::new(self.config, client, run_dir.path())?;
        Ok(Services {
            run_dir,
            publisher,
            narrator,
            synthesizer,
        })
    }

    async fn run_pages(
        &self,
        pages: Vec<PageImage>,
        render_duration_ms: u64,
    ) -> Result<PodcastOutput, PodcastError> {
        let services = self.services().await?;
        let total = pages.len();
        if let Some(cb) = self.callback() {
            cb.on_run_start(total);
        }

        let mut results = Vec::with_capacity(total);
        let mut clips: Vec<AudioClip> = Vec::new();
        for page in &pages {
            let (result, page_clips) = self.process_page(&services, page, total).await?;
            results.push(result);
            clips.extend(page_clips);
        }

        self.enter(SessionStage::Merging);
        let paths: Vec<PathBuf> = clips.into_iter().map(|c| c.path).collect();
        let podcast = merge::merge_clips(&paths, &self.config.output_path).await?;
        if let Some(cb) = self.callback() {
            cb.on_merge_complete(&podcast.path, podcast.duration_ms);
        }

        let stats = PodcastStats {
            total_pages: total,
            narrated_pages: results.iter().filter(|p| p.error.is_none()).count(),
            failed_pages: results.iter().filter(|p| p.error.is_some()).count(),
            synthesized_lines: results.iter().map(PageResult::synthesized_lines).sum(),
            failed_lines: results
                .iter()
                .map(|p| p.lines.len() - p.synthesized_lines())
                .sum(),
            total_duration_ms: self.started.elapsed().as_millis() as u64,
            render_duration_ms,
            podcast_duration_ms: podcast.duration_ms,
        };

        info!(
            "Podcast complete: {}/{} pages narrated, {} clips, {}ms audio",
            stats.narrated_pages, total, podcast.clip_count, podcast.duration_ms
        );

        self.enter(SessionStage::Done);
        if let Some(cb) = self.callback() {
            cb.on_run_complete(total, stats.narrated_pages, podcast.clip_count);
        }

        // `services.run_dir` drops here, removing every clip.
        Ok(PodcastOutput {
            pages: results,
            podcast,
            stats,
        })
    }

    async fn process_page(
        &self,
        services: &Services,
        page: &PageImage,
        total: usize,
    ) -> Result<(PageResult, Vec<AudioClip>), PodcastError> {
        let start = Instant::now();
        let page_num = page.page_num;

        // ── Publish (fatal) ──────────────────────────────────────────────
        self.enter(SessionStage::Publishing { page: page_num });
        let asset = {
            // The local PNG is deleted when `png` drops, upload or not.
            let png = encode::write_page_png(page, services.run_dir.path())?;
            services.publisher.publish(png.path(), &page.file_name()).await?
        };
        info!("Page {}: published {}", page_num, asset.url);
        if let Some(cb) = self.callback() {
            cb.on_page_published(page_num, total, &asset.url);
        }

        // ── Narrate (localized) ──────────────────────────────────────────
        self.enter(SessionStage::Narrating { page: page_num });
        let script = match services.narrator.narrate(page_num, &asset.url).await {
            Ok(script) => {
                if let Some(cb) = self.callback() {
                    cb.on_script_ready(page_num, total, &script);
                }
                script
            }
            Err(e) => {
                if let Some(cb) = self.callback() {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
                let result = PageResult {
                    page_num,
                    image_url: asset.url,
                    script: String::new(),
                    lines: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(e),
                };
                return Ok((result, Vec::new()));
            }
        };

        // ── Synthesize (localized per line) ──────────────────────────────
        let mut lines = Vec::new();
        let mut clips = Vec::new();
        for script_line in split_lines(&script) {
            let line = script_line.index + 1;
            let voice = assign_voice(&self.config.voices, script_line.index)
                .ok_or_else(|| PodcastError::InvalidConfig("No voice selected".into()))?;

            self.enter(SessionStage::Synthesizing { page: page_num, line });
            let outcome = services
                .synthesizer
                .synthesize(page_num, line, &script_line.text, voice)
                .await;

            let error = match outcome {
                Ok(clip) => {
                    if let Some(cb) = self.callback() {
                        cb.on_line_synthesized(page_num, line, voice);
                    }
                    clips.push(clip);
                    None
                }
                Err(e) => {
                    if let Some(cb) = self.callback() {
                        cb.on_line_error(page_num, line, &e.to_string());
                    }
                    Some(e)
                }
            };
            lines.push(LineResult {
                line,
                voice,
                text: script_line.text,
                error,
            });
        }

        debug!(
            "Page {}: {}/{} lines synthesised",
            page_num,
            clips.len(),
            lines.len()
        );

        Ok((
            PageResult {
                page_num,
                image_url: asset.url,
                script,
                lines,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            clips,
        ))
    }
}

/// Use the injected publisher if there is one, else build an S3 publisher
/// from the storage settings.
async fn resolve_publisher(config: &PodcastConfig) -> Result<Arc<dyn AssetPublisher>, PodcastError> {
    if let Some(ref publisher) = config.publisher {
        return Ok(Arc::clone(publisher));
    }
    Ok(Arc::new(S3Publisher::from_config(&config.storage).await?))
}
