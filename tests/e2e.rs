//! End-to-end integration tests for pdf2podcast.
//!
//! The chat and TTS services are stood in for by wiremock servers and the
//! object store by an in-memory publisher, so everything except the pdfium
//! tests runs offline. Tests that render real PDFs from `./test_cases/`
//! are gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Including the pdfium-backed tests:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use pdf2podcast::pipeline::merge::clip_duration_ms;
use pdf2podcast::pipeline::normalize::is_normalized;
use pdf2podcast::pipeline::render::rasterize;
use pdf2podcast::{
    generate_podcast, inspect, podcast_from_images, AssetPublisher, PageSelection, PodcastConfig,
    PodcastError, PodcastProgressCallback, PublishedAsset, StageError, Voice,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/testapp/v3/chat-completions/HCX-005";
const TTS_PATH: &str = "/tts-premium/v1/tts";

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// `count` silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz, stereo).
fn silent_mp3(count: usize) -> Vec<u8> {
    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
    const FRAME_LEN: usize = 417;
    let mut out = Vec::with_capacity(count * FRAME_LEN);
    for _ in 0..count {
        out.extend_from_slice(&HEADER);
        out.resize(out.len() + FRAME_LEN - HEADER.len(), 0);
    }
    out
}

/// A slide with a distinct flat colour per page.
fn slide(shade: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 180, Rgb([shade, 40, 200 - shade])))
}

/// Keeps published pages in memory and hands out stable fake URLs.
#[derive(Default)]
struct MemoryPublisher {
    uploads: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl AssetPublisher for MemoryPublisher {
    async fn publish(
        &self,
        local_path: &Path,
        logical_name: &str,
    ) -> Result<PublishedAsset, PodcastError> {
        let bytes = std::fs::read(local_path).map_err(|e| PodcastError::PublishFailed {
            key: logical_name.to_string(),
            detail: e.to_string(),
        })?;
        assert_eq!(&bytes[1..4], b"PNG", "published file must be a PNG");
        self.uploads
            .lock()
            .unwrap()
            .push((logical_name.to_string(), bytes.len()));
        let key = format!("slides/{logical_name}");
        Ok(PublishedAsset {
            url: format!("https://cdn.example.com/{key}"),
            key,
        })
    }
}

/// Records the inline events a UI would render.
#[derive(Default)]
struct EventLog {
    published: Mutex<Vec<(usize, String)>>,
    scripts: Mutex<Vec<usize>>,
    page_errors: Mutex<Vec<(usize, String)>>,
    lines: Mutex<Vec<(usize, usize, Voice)>>,
}

impl PodcastProgressCallback for EventLog {
    fn on_page_published(&self, page_num: usize, _total_pages: usize, url: &str) {
        self.published.lock().unwrap().push((page_num, url.to_string()));
    }

    fn on_script_ready(&self, page_num: usize, _total_pages: usize, _script: &str) {
        self.scripts.lock().unwrap().push(page_num);
    }

    fn on_page_error(&self, page_num: usize, _total_pages: usize, error: &str) {
        self.page_errors
            .lock()
            .unwrap()
            .push((page_num, error.to_string()));
    }

    fn on_line_synthesized(&self, page_num: usize, line: usize, voice: Voice) {
        self.lines.lock().unwrap().push((page_num, line, voice));
    }
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": {"code": "20000", "message": "OK"},
        "result": {"message": {"role": "assistant", "content": content}}
    }))
}

async fn mount_tts(server: &MockServer, frames_per_clip: usize) {
    Mock::given(method("POST"))
        .and(path(TTS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(silent_mp3(frames_per_clip)),
        )
        .mount(server)
        .await;
}

struct Harness {
    work: TempDir,
    publisher: Arc<MemoryPublisher>,
    events: Arc<EventLog>,
}

impl Harness {
    fn new() -> Self {
        Self {
            work: tempfile::tempdir().unwrap(),
            publisher: Arc::new(MemoryPublisher::default()),
            events: Arc::new(EventLog::default()),
        }
    }

    fn output(&self) -> PathBuf {
        self.work.path().join("final_podcast.mp3")
    }

    fn config(&self, server: &MockServer, voices: Vec<Voice>) -> PodcastConfig {
        PodcastConfig::builder()
            .publisher(self.publisher.clone())
            .progress_callback(self.events.clone())
            .chat_base_url(server.uri())
            .chat_api_key("Bearer test-key")
            .tts_url(format!("{}{TTS_PATH}", server.uri()))
            .tts_credentials("client-id", "client-secret")
            .voices(voices)
            .work_dir(self.work.path().join("scratch"))
            .output_path(self.output())
            .build()
            .unwrap()
    }
}

// ── Full runs against mocked services ────────────────────────────────────────

#[tokio::test]
async fn test_two_page_run_single_voice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(chat_reply(
            "## 오늘의 주제\n\n이 슬라이드는 전체 구조를 보여줍니다.\n핵심은 **단순함**입니다.",
        ))
        .expect(2)
        .mount(&server)
        .await;
    mount_tts(&server, 10).await;

    let h = Harness::new();
    let config = h.config(&server, vec![Voice::Ndain]);
    let output = podcast_from_images(vec![slide(10), slide(120)], &config)
        .await
        .expect("run should succeed");

    // Two published URLs, in page order.
    let urls = output.image_urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].ends_with("page_1.png"));
    assert!(urls[1].ends_with("page_2.png"));
    assert_eq!(h.publisher.uploads.lock().unwrap().len(), 2);

    // Two non-empty scripts, markdown already stripped.
    for page in &output.pages {
        assert!(page.error.is_none());
        assert!(!page.script.trim().is_empty());
        assert!(!page.script.contains('#'));
        assert!(!page.script.contains("**"));
        assert!(page.lines.iter().all(|l| l.voice == Voice::Ndain));
    }

    // Merged duration is the sum of every clip's duration.
    let clip_count: usize = output.pages.iter().map(|p| p.synthesized_lines()).sum();
    assert_eq!(clip_count, 6);
    assert_eq!(output.podcast.clip_count, clip_count);
    let per_clip = clip_duration_ms(&silent_mp3(10));
    assert_eq!(output.podcast.duration_ms, per_clip * clip_count as u64);

    let written = std::fs::read(h.output()).unwrap();
    assert_eq!(written.len() as u64, output.podcast.size_bytes);
    assert_eq!(written.len(), silent_mp3(10).len() * clip_count);
    assert_eq!(output.stats.failed_lines, 0);

    // Scratch files are gone once the run returns.
    let scratch = h.work.path().join("scratch");
    let leftovers = std::fs::read_dir(&scratch).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0, "run directory should be removed");

    let published = h.events.published.lock().unwrap();
    assert_eq!(published.len(), 2);
    assert_eq!(*h.events.scripts.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_narration_failure_is_shown_in_place_of_script() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_string_contains("page_1.png"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_string_contains("page_2.png"))
        .respond_with(chat_reply("두 번째 슬라이드 설명입니다."))
        .mount(&server)
        .await;
    mount_tts(&server, 4).await;

    let h = Harness::new();
    let config = h.config(&server, vec![Voice::Ndaeseong]);
    let output = podcast_from_images(vec![slide(0), slide(90)], &config)
        .await
        .expect("a failed page must not abort the run");

    let first = &output.pages[0];
    assert!(matches!(
        first.error,
        Some(StageError::NarrationFailed { page: 1, .. })
    ));
    let shown = first.display_text();
    assert!(shown.contains("500"), "got: {shown}");
    assert!(shown.contains("model overloaded"));
    assert!(first.lines.is_empty());
    assert!(!first.image_url.is_empty());

    assert!(output.pages[1].error.is_none());
    assert_eq!(output.podcast.clip_count, 1);
    assert_eq!(output.stats.narrated_pages, 1);
    assert_eq!(output.stats.failed_pages, 1);

    let errors = h.events.page_errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, 1);
}

#[tokio::test]
async fn test_voices_rotate_line_by_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(chat_reply("첫 줄입니다.\n둘째 줄입니다.\n셋째 줄입니다."))
        .mount(&server)
        .await;
    mount_tts(&server, 2).await;

    let h = Harness::new();
    let config = h.config(&server, vec![Voice::Ndain, Voice::Neunwoo]);
    let output = podcast_from_images(vec![slide(50)], &config).await.unwrap();

    let voices: Vec<Voice> = output.pages[0].lines.iter().map(|l| l.voice).collect();
    assert_eq!(voices, vec![Voice::Ndain, Voice::Neunwoo, Voice::Ndain]);

    // The requests reached the TTS service in line order with those speakers.
    let speakers: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == TTS_PATH)
        .map(|r| {
            let body = String::from_utf8_lossy(&r.body).to_string();
            body.split('&')
                .find_map(|kv| kv.strip_prefix("speaker=").map(str::to_string))
                .unwrap()
        })
        .collect();
    assert_eq!(speakers, vec!["ndain", "neunwoo", "ndain"]);

    let lines = h.events.lines.lock().unwrap();
    assert_eq!(
        *lines,
        vec![
            (1, 1, Voice::Ndain),
            (1, 2, Voice::Neunwoo),
            (1, 3, Voice::Ndain)
        ]
    );
}

#[tokio::test]
async fn test_failed_line_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(chat_reply("살아남는 줄입니다.\n실패하는 줄입니다."))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TTS_PATH))
        .and(body_string_contains("speaker=neunseo"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid speaker"))
        .mount(&server)
        .await;
    mount_tts(&server, 3).await;

    let h = Harness::new();
    let config = h.config(&server, vec![Voice::Ndain, Voice::Neunseo]);
    let output = podcast_from_images(vec![slide(200)], &config).await.unwrap();

    let lines = &output.pages[0].lines;
    assert!(lines[0].error.is_none());
    assert!(matches!(
        lines[1].error,
        Some(StageError::SynthesisFailed { line: 2, .. })
    ));
    assert_eq!(output.podcast.clip_count, 1);
    assert_eq!(output.stats.failed_lines, 1);
    assert_eq!(output.podcast.duration_ms, clip_duration_ms(&silent_mp3(3)));
}

#[tokio::test]
async fn test_no_audio_at_all_fails_without_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = Harness::new();
    let config = h.config(&server, vec![Voice::Ndain]);
    let err = podcast_from_images(vec![slide(1)], &config)
        .await
        .unwrap_err();

    assert!(matches!(err, PodcastError::MergeFailed { .. }), "got {err}");
    assert!(!h.output().exists());
}

#[tokio::test]
async fn test_page_selection_limits_published_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(chat_reply("세 번째 페이지입니다."))
        .expect(1)
        .mount(&server)
        .await;
    mount_tts(&server, 1).await;

    let h = Harness::new();
    let mut config = h.config(&server, vec![Voice::Ndain]);
    config.pages = PageSelection::Single(3);
    let output = podcast_from_images(vec![slide(0), slide(1), slide(2)], &config)
        .await
        .unwrap();

    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.pages[0].page_num, 3);
    let uploads = h.publisher.uploads.lock().unwrap();
    assert_eq!(uploads[0].0, "page_3.png");
}

#[tokio::test]
async fn test_output_json_serialisable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(chat_reply("한 줄 요약입니다."))
        .mount(&server)
        .await;
    mount_tts(&server, 1).await;

    let h = Harness::new();
    let config = h.config(&server, vec![Voice::NesCHyeri]);
    let output = podcast_from_images(vec![slide(5)], &config).await.unwrap();

    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["pages"][0]["lines"][0]["voice"], "nes_c_hyeri");
    assert_eq!(json["podcast"]["clip_count"], 1);
}

// ── pdfium-backed tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_nonexistent() {
    let config = PodcastConfig::default();
    let err = inspect("/definitely/not/here.pdf", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PodcastError::FileNotFound { .. }));
}

/// Page fills of `test_cases/three_slides.pdf`, in page order.
const SLIDE_FILLS: [[u8; 3]; 3] = [[255, 0, 0], [0, 153, 0], [0, 0, 255]];

fn fixture_config() -> PodcastConfig {
    PodcastConfig::from_env()
}

fn assert_fill(img: &DynamicImage, expected: [u8; 3], context: &str) {
    let rgb = img.to_rgb8();
    let px = rgb.get_pixel(rgb.width() / 2, rgb.height() / 2).0;
    for (got, want) in px.iter().zip(expected) {
        assert!(
            got.abs_diff(want) <= 8,
            "[{context}] centre pixel {px:?}, expected about {expected:?}"
        );
    }
}

#[tokio::test]
async fn test_inspect_three_slides() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("three_slides.pdf"));
    let meta = inspect(pdf.to_string_lossy(), &fixture_config())
        .await
        .unwrap();
    assert_eq!(meta.page_count, 3);
    assert!(!meta.pdf_version.is_empty());
}

#[tokio::test]
async fn test_rasterize_pages_in_order_and_normalized() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("three_slides.pdf"));
    let bytes = std::fs::read(&pdf).unwrap();

    let pages = rasterize(bytes, &fixture_config()).await.unwrap();

    assert_eq!(pages.len(), 3);
    for (i, page) in pages.iter().enumerate() {
        let context = format!("page {}", i + 1);
        assert_eq!(page.page_num, i + 1);
        assert!(
            is_normalized(page.width(), page.height()),
            "[{context}] {}x{} violates the size limits",
            page.width(),
            page.height()
        );
        assert!(page.width() > page.height(), "[{context}] landscape");
        assert_fill(&page.image, SLIDE_FILLS[i], &context);
    }
}

#[tokio::test]
async fn test_rasterize_respects_page_selection() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("three_slides.pdf"));
    let bytes = std::fs::read(&pdf).unwrap();

    let mut config = fixture_config();
    config.pages = PageSelection::Set(vec![3, 1]);
    let pages = rasterize(bytes, &config).await.unwrap();

    let numbers: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_fill(&pages[1].image, SLIDE_FILLS[2], "page 3");
}

#[tokio::test]
async fn test_generate_from_pdf_first_two_pages() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("three_slides.pdf"));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(chat_reply("이 페이지를 설명합니다.\n다음으로 넘어갑니다."))
        .mount(&server)
        .await;
    mount_tts(&server, 5).await;

    let h = Harness::new();
    let mut config = h.config(&server, vec![Voice::Ndain]);
    config.pdfium_library_path = fixture_config().pdfium_library_path;
    config.pages = PageSelection::Range(1, 2);
    let output = generate_podcast(pdf.to_string_lossy(), &config)
        .await
        .unwrap();

    assert_eq!(output.image_urls().len(), 2);
    assert!(output.pages.iter().all(|p| !p.script.is_empty()));
    assert_eq!(output.podcast.clip_count, 4);
    assert_eq!(
        output.podcast.duration_ms,
        clip_duration_ms(&silent_mp3(5)) * output.podcast.clip_count as u64
    );
}

// ── Thread-safety ────────────────────────────────────────────────────────────

#[test]
fn test_public_types_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PodcastConfig>();
    assert_send_sync::<MemoryPublisher>();
    assert_send_sync::<EventLog>();
}
