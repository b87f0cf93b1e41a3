//! Configuration types for PDF-to-podcast generation.
//!
//! Everything a run needs (rendering knobs, service endpoints, credentials,
//! voice selection) lives in one [`PodcastConfig`], constructed once at
//! process start and passed by reference to every stage. Nothing in the
//! library reads the environment on its own; [`PodcastConfig::from_env`] is
//! the single place environment variables are turned into configuration.

use crate::error::PodcastError;
use crate::pipeline::publish::AssetPublisher;
use crate::progress::ProgressCallback;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default chat-completion host.
pub const DEFAULT_CHAT_BASE_URL: &str = "https://clovastudio.stream.ntruss.com";
/// Default chat-completion path (vision-capable model).
pub const DEFAULT_CHAT_PATH: &str = "/testapp/v3/chat-completions/HCX-005";
/// Default TTS endpoint.
pub const DEFAULT_TTS_URL: &str = "https://naveropenapi.apigw.ntruss.com/tts-premium/v1/tts";
/// Default tone embedded in the narration system prompt.
pub const DEFAULT_TONE: &str = "친절하고 명확하게";
/// Default object-storage folder prefix.
pub const DEFAULT_STORAGE_FOLDER: &str = "converted_images";
/// Default name of the merged podcast file.
pub const DEFAULT_OUTPUT_FILE: &str = "final_podcast.mp3";

/// Configuration for a PDF-to-podcast run.
///
/// Built via [`PodcastConfig::builder()`], [`PodcastConfig::from_env()`]
/// or [`PodcastConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2podcast::{PodcastConfig, Voice};
///
/// let config = PodcastConfig::builder()
///     .voices(vec![Voice::Ndain, Voice::Neunwoo])
///     .tone("calm and precise")
///     .chat_api_key("my-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.voices.len(), 2);
/// ```
#[derive(Clone)]
pub struct PodcastConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Render-time cap on either page dimension in pixels. Default: 10 000.
    ///
    /// Guards memory on poster-sized pages before normalisation brings the
    /// image down to the 2240 px upload limit.
    pub max_rendered_pixels: u32,

    /// Path to libpdfium (the file itself or the directory holding it).
    /// If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// S3-compatible storage the page images are published to.
    pub storage: StorageConfig,

    /// Pre-constructed publisher. Takes precedence over `storage`.
    pub publisher: Option<Arc<dyn AssetPublisher>>,

    /// Chat-completion endpoint used by the narrator.
    pub chat: ChatConfig,

    /// Tone directive embedded in the system prompt. Default: "친절하고 명확하게" (friendly and clear).
    pub tone: String,

    /// Custom system prompt. `{tone}` is substituted if present.
    /// If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// TTS endpoint and credentials.
    pub tts: TtsConfig,

    /// Voices assigned round-robin to script lines. Never empty.
    pub voices: Vec<Voice>,

    /// TTS speed (provider scale, 0 = normal). Range: -5–5. Default: 0.
    pub speed: i32,

    /// Where the merged podcast is written. Default: `final_podcast.mp3`.
    pub output_path: PathBuf,

    /// Parent directory for the run-scoped temporary directory.
    /// If None, the system temp directory is used.
    pub work_dir: Option<PathBuf>,

    /// Timeout for every chat / TTS call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives stage changes and per-page results as they complete.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 10_000,
            pdfium_library_path: None,
            password: None,
            pages: PageSelection::default(),
            storage: StorageConfig::default(),
            publisher: None,
            chat: ChatConfig::default(),
            tone: DEFAULT_TONE.to_string(),
            system_prompt: None,
            tts: TtsConfig::default(),
            voices: vec![Voice::default()],
            speed: 0,
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            work_dir: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PodcastConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PodcastConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("pages", &self.pages)
            .field("storage", &self.storage)
            .field("publisher", &self.publisher.as_ref().map(|_| "<dyn AssetPublisher>"))
            .field("chat", &self.chat)
            .field("tone", &self.tone)
            .field("tts", &self.tts)
            .field("voices", &self.voices)
            .field("speed", &self.speed)
            .field("output_path", &self.output_path)
            .finish()
    }
}

impl PodcastConfig {
    /// Create a new builder for `PodcastConfig`.
    pub fn builder() -> PodcastConfigBuilder {
        PodcastConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// Reads `OBJECT_STORAGE_*`, `CLOVA_API_KEY`, `NAVER_CLIENT_ID`,
    /// `NAVER_CLIENT_SECRET` and `PDFIUM_LIB_PATH`. Missing values stay unset;
    /// they are only required once the stage that uses them runs.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let secret = |key: &str| get(key).map(SecretString::from);

        let mut config = Self::default();
        config.storage = StorageConfig {
            endpoint: get("OBJECT_STORAGE_ENDPOINT"),
            bucket: get("OBJECT_STORAGE_BUCKET"),
            folder: get("OBJECT_STORAGE_FOLDER")
                .unwrap_or_else(|| DEFAULT_STORAGE_FOLDER.to_string()),
            region: get("OBJECT_STORAGE_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key: secret("OBJECT_STORAGE_ACCESS_KEY"),
            secret_key: secret("OBJECT_STORAGE_SECRET_KEY"),
        };
        config.chat.api_key = secret("CLOVA_API_KEY");
        config.tts.client_id = secret("NAVER_CLIENT_ID");
        config.tts.client_secret = secret("NAVER_CLIENT_SECRET");
        config.pdfium_library_path = get("PDFIUM_LIB_PATH").map(PathBuf::from);
        config
    }
}

/// Builder for [`PodcastConfig`].
#[derive(Debug)]
pub struct PodcastConfigBuilder {
    config: PodcastConfig,
}

impl PodcastConfigBuilder {
    /// Start from an existing configuration (e.g. one read from the environment).
    pub fn from_config(config: PodcastConfig) -> Self {
        Self { config }
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn AssetPublisher>) -> Self {
        self.config.publisher = Some(publisher);
        self
    }

    pub fn chat_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.chat.base_url = url.into();
        self
    }

    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.config.chat.path = path.into();
        self
    }

    pub fn chat_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.chat.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.chat.max_tokens = n;
        self
    }

    pub fn tone(mut self, tone: impl Into<String>) -> Self {
        self.config.tone = tone.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn tts_url(mut self, url: impl Into<String>) -> Self {
        self.config.tts.url = url.into();
        self
    }

    pub fn tts_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config.tts.client_id = Some(SecretString::from(client_id.into()));
        self.config.tts.client_secret = Some(SecretString::from(client_secret.into()));
        self
    }

    /// Set only the TTS client id; the synthesizer reports a missing secret.
    pub fn tts_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.tts.client_id = Some(SecretString::from(client_id.into()));
        self
    }

    pub fn tts_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.config.tts.client_secret = Some(SecretString::from(client_secret.into()));
        self
    }

    pub fn voices(mut self, voices: Vec<Voice>) -> Self {
        self.config.voices = voices;
        self
    }

    pub fn speed(mut self, speed: i32) -> Self {
        self.config.speed = speed;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PodcastConfig, PodcastError> {
        let c = &self.config;
        if c.voices.is_empty() {
            return Err(PodcastError::InvalidConfig(
                "At least one voice must be selected".into(),
            ));
        }
        if !(-5..=5).contains(&c.speed) {
            return Err(PodcastError::InvalidConfig(format!(
                "Speed must be -5–5, got {}",
                c.speed
            )));
        }
        if c.chat.max_tokens == 0 {
            return Err(PodcastError::InvalidConfig("maxTokens must be ≥ 1".into()));
        }
        if c.output_path.as_os_str().is_empty() {
            return Err(PodcastError::InvalidConfig("Output path is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Service sections ─────────────────────────────────────────────────────

const DEFAULT_REGION: &str = "kr-standard";

/// S3-compatible object storage settings.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Endpoint URL, e.g. `https://kr.object.ncloudstorage.com`.
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    /// Key prefix for uploaded page images. Default: `converted_images`.
    pub folder: String,
    pub region: String,
    pub access_key: Option<SecretString>,
    pub secret_key: Option<SecretString>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            folder: DEFAULT_STORAGE_FOLDER.to_string(),
            region: DEFAULT_REGION.to_string(),
            access_key: None,
            secret_key: None,
        }
    }
}

/// Chat-completion API settings.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub base_url: String,
    pub path: String,
    /// Sent verbatim in the `Authorization` header.
    pub api_key: Option<SecretString>,
    /// Response token budget (`maxTokens`). Default: 512.
    pub max_tokens: usize,
}

impl ChatConfig {
    /// Full endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            path: DEFAULT_CHAT_PATH.to_string(),
            api_key: None,
            max_tokens: 512,
        }
    }
}

/// TTS API settings.
#[derive(Clone, Debug)]
pub struct TtsConfig {
    pub url: String,
    pub client_id: Option<SecretString>,
    pub client_secret: Option<SecretString>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TTS_URL.to_string(),
            client_id: None,
            client_secret: None,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The fixed catalog of TTS voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    #[default]
    Ndaeseong,
    Ndain,
    Ndonghyun,
    NesCHyeri,
    NesCKihyo,
    NesCMikyung,
    NesCSohyun,
    Neunseo,
    Neunwoo,
}

impl Voice {
    /// Every voice, in catalog order.
    pub const ALL: [Voice; 9] = [
        Voice::Ndaeseong,
        Voice::Ndain,
        Voice::Ndonghyun,
        Voice::NesCHyeri,
        Voice::NesCKihyo,
        Voice::NesCMikyung,
        Voice::NesCSohyun,
        Voice::Neunseo,
        Voice::Neunwoo,
    ];

    /// Speaker identifier sent to the TTS API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Ndaeseong => "ndaeseong",
            Voice::Ndain => "ndain",
            Voice::Ndonghyun => "ndonghyun",
            Voice::NesCHyeri => "nes_c_hyeri",
            Voice::NesCKihyo => "nes_c_kihyo",
            Voice::NesCMikyung => "nes_c_mikyung",
            Voice::NesCSohyun => "nes_c_sohyun",
            Voice::Neunseo => "neunseo",
            Voice::Neunwoo => "neunwoo",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Voice::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| PodcastError::InvalidConfig(format!("Unknown voice '{s}'")))
    }
}

/// Specifies which pages of the PDF to narrate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Narrate all pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
