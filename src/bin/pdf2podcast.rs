//! CLI binary for pdf2podcast.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PodcastConfig`, shows each page's result as it arrives and writes the
//! merged podcast.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2podcast::{
    generate_podcast, inspect, MergedPodcast, PageSelection, PodcastConfig, PodcastProgressCallback,
    ProgressCallback, SessionStage, StorageConfig, Voice,
};
use secrecy::SecretString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar at the bottom, and above it each
/// page's image URL and script as soon as they exist.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Pages whose processing has started.
    pages_started: AtomicUsize,
    line_errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner-only until `on_run_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages_started: AtomicUsize::new(0),
            line_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Narrating");
    }
}

impl PodcastProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: &SessionStage) {
        match stage {
            SessionStage::Rasterizing => self.bar.set_message("rendering pages…"),
            SessionStage::Publishing { page } => {
                let started = self.pages_started.fetch_add(1, Ordering::SeqCst);
                self.bar.set_position(started as u64);
                self.bar.set_message(format!("page {page}: uploading"));
            }
            SessionStage::Narrating { page } => {
                self.bar.set_message(format!("page {page}: writing script"))
            }
            SessionStage::Synthesizing { page, line } => {
                self.bar.set_message(format!("page {page}: speaking line {line}"))
            }
            SessionStage::Merging => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
                self.bar.set_prefix("Merging");
                self.bar.set_message("joining clips…");
            }
            _ => {}
        }
    }

    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Narrating {total_pages} pages…"))
        ));
    }

    fn on_page_published(&self, page_num: usize, total_pages: usize, url: &str) {
        self.bar.println(format!(
            "\n{} {}  {}",
            cyan("■"),
            bold(&format!("Page {page_num}/{total_pages}")),
            dim(url)
        ));
    }

    fn on_script_ready(&self, _page_num: usize, _total_pages: usize, script: &str) {
        for line in script.lines() {
            self.bar.println(format!("    {line}"));
        }
    }

    fn on_page_error(&self, _page_num: usize, _total_pages: usize, error: &str) {
        for line in error.lines() {
            self.bar.println(format!("    {}", red(line)));
        }
    }

    fn on_line_error(&self, page_num: usize, line: usize, error: &str) {
        self.line_errors.fetch_add(1, Ordering::SeqCst);
        let msg = match error.char_indices().nth(100) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} TTS page {page_num} line {line}: {}",
            red("✗"),
            red(&msg)
        ));
    }

    fn on_merge_complete(&self, path: &Path, duration_ms: u64) {
        self.bar.println(format!(
            "\n{} merged {} of audio → {} {}",
            green("♪"),
            format_duration(duration_ms),
            bold(&path.display().to_string()),
            dim(&format!("({})", MergedPodcast::MIME_TYPE))
        ));
    }

    fn on_run_complete(&self, total_pages: usize, narrated: usize, clip_count: usize) {
        self.bar.finish_and_clear();
        let failed_pages = total_pages.saturating_sub(narrated);
        let failed_lines = self.line_errors.load(Ordering::SeqCst);

        if failed_pages == 0 && failed_lines == 0 {
            eprintln!(
                "{} {} pages narrated, {} clips",
                green("✔"),
                bold(&narrated.to_string()),
                clip_count
            );
        } else {
            eprintln!(
                "{} {}/{} pages narrated, {} clips  ({} pages failed, {} lines skipped)",
                cyan("⚠"),
                bold(&narrated.to_string()),
                total_pages,
                clip_count,
                red(&failed_pages.to_string()),
                red(&failed_lines.to_string()),
            );
        }
    }
}

fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrate a deck with the default voice
  pdf2podcast deck.pdf

  # Two voices taking turns line by line, custom output file
  pdf2podcast deck.pdf --voice ndain --voice neunwoo -o episode.mp3

  # Only the first five slides, slower delivery
  pdf2podcast --pages 1-5 --speed 2 deck.pdf

  # From a URL, JSON result on stdout
  pdf2podcast https://example.com/deck.pdf --json > result.json

  # Inspect PDF metadata (no credentials needed)
  pdf2podcast --inspect-only deck.pdf

VOICES:
  ndaeseong (default), ndain, ndonghyun, nes_c_hyeri, nes_c_kihyo,
  nes_c_mikyung, nes_c_sohyun, neunseo, neunwoo

ENVIRONMENT VARIABLES:
  OBJECT_STORAGE_ENDPOINT     S3-compatible endpoint URL
  OBJECT_STORAGE_BUCKET       Bucket receiving the page images
  OBJECT_STORAGE_FOLDER       Key prefix (default: converted_images)
  OBJECT_STORAGE_REGION       Signing region (default: kr-standard)
  OBJECT_STORAGE_ACCESS_KEY   Storage access key
  OBJECT_STORAGE_SECRET_KEY   Storage secret key
  CLOVA_API_KEY               Chat-completion API key (sent as Authorization)
  NAVER_CLIENT_ID             TTS client id
  NAVER_CLIENT_SECRET         TTS client secret
  PDFIUM_LIB_PATH             libpdfium file or directory (else system library)
"#;

/// Turn a PDF slide deck into a narrated podcast.
#[derive(Parser)]
#[command(
    name = "pdf2podcast",
    version,
    about = "Turn a PDF slide deck into a narrated MP3 podcast",
    long_about = "Rasterise each page of a PDF, publish it to object storage, have a vision \
chat model write a spoken script per slide, synthesise every script line with text-to-speech \
and join the clips into one MP3 file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Where to write the merged podcast.
    #[arg(short, long, env = "PDF2PODCAST_OUTPUT", default_value = "final_podcast.mp3")]
    output: PathBuf,

    /// TTS voice; repeat to rotate voices line by line.
    #[arg(long = "voice", value_name = "VOICE")]
    voices: Vec<Voice>,

    /// Tone directive for the script writer.
    #[arg(long, env = "PDF2PODCAST_TONE")]
    tone: Option<String>,

    /// Speech speed, -5 (faster) to 5 (slower).
    #[arg(long, env = "PDF2PODCAST_SPEED", default_value_t = 0, allow_hyphen_values = true,
          value_parser = clap::value_parser!(i32).range(-5..=5))]
    speed: i32,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2PODCAST_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2PODCAST_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PODCAST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt ({tone} is substituted).
    #[arg(long, env = "PDF2PODCAST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Response token budget per page.
    #[arg(long, env = "PDF2PODCAST_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// Output the full result (pages, lines, stats) as JSON on stdout.
    #[arg(long, env = "PDF2PODCAST_JSON")]
    json: bool,

    /// Disable progress display.
    #[arg(long, env = "PDF2PODCAST_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only; nothing is uploaded or synthesised.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PODCAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PODCAST_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2PODCAST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-request timeout for the chat and TTS APIs, in seconds.
    #[arg(long, env = "PDF2PODCAST_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Directory for the run's scratch files (default: system temp dir).
    #[arg(long, env = "PDF2PODCAST_WORK_DIR")]
    work_dir: Option<PathBuf>,

    // ── Services ─────────────────────────────────────────────────────────
    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    #[arg(long, env = "OBJECT_STORAGE_ENDPOINT")]
    storage_endpoint: Option<String>,

    #[arg(long, env = "OBJECT_STORAGE_BUCKET")]
    storage_bucket: Option<String>,

    #[arg(long, env = "OBJECT_STORAGE_FOLDER", default_value = "converted_images")]
    storage_folder: String,

    #[arg(long, env = "OBJECT_STORAGE_REGION", default_value = "kr-standard")]
    storage_region: String,

    #[arg(long, env = "OBJECT_STORAGE_ACCESS_KEY", hide_env_values = true)]
    storage_access_key: Option<String>,

    #[arg(long, env = "OBJECT_STORAGE_SECRET_KEY", hide_env_values = true)]
    storage_secret_key: Option<String>,

    /// Chat API base URL.
    #[arg(long, env = "CLOVA_BASE_URL")]
    chat_base_url: Option<String>,

    #[arg(long, env = "CLOVA_API_KEY", hide_env_values = true)]
    clova_api_key: Option<String>,

    /// TTS endpoint URL.
    #[arg(long, env = "NAVER_TTS_URL")]
    tts_url: Option<String>,

    #[arg(long, env = "NAVER_CLIENT_ID", hide_env_values = true)]
    naver_client_id: Option<String>,

    #[arg(long, env = "NAVER_CLIENT_SECRET", hide_env_values = true)]
    naver_client_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the scripts printed above the
    // progress bar, so they are suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PodcastProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = generate_podcast(&cli.input, &config)
        .await
        .context("Podcast generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        // Without the progress display nothing has been shown yet.
        for page in &output.pages {
            println!("## Page {}  {}", page.page_num, page.image_url);
            println!("{}\n", page.display_text());
            for line in page.lines.iter().filter(|l| l.error.is_some()) {
                if let Some(ref e) = line.error {
                    eprintln!("  TTS error: {e}");
                }
            }
        }
        eprintln!(
            "Narrated {}/{} pages, {} clips, {} of audio → {} ({})",
            output.stats.narrated_pages,
            output.stats.total_pages,
            output.podcast.clip_count,
            format_duration(output.podcast.duration_ms),
            output.podcast.path.display(),
            MergedPodcast::MIME_TYPE
        );
    } else if !cli.quiet {
        eprintln!(
            "   {}",
            dim(&format!("{}ms total", output.stats.total_duration_ms))
        );
    }

    Ok(())
}

/// Map CLI args to `PodcastConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PodcastConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let pages = parse_pages(&cli.pages)?;
    let voices = if cli.voices.is_empty() {
        vec![Voice::default()]
    } else {
        cli.voices.clone()
    };

    let mut builder = PodcastConfig::builder()
        .dpi(cli.dpi)
        .pages(pages)
        .voices(voices)
        .speed(cli.speed)
        .max_tokens(cli.max_tokens)
        .output_path(&cli.output)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .storage(StorageConfig {
            endpoint: cli.storage_endpoint.clone(),
            bucket: cli.storage_bucket.clone(),
            folder: cli.storage_folder.clone(),
            region: cli.storage_region.clone(),
            access_key: cli.storage_access_key.clone().map(SecretString::from),
            secret_key: cli.storage_secret_key.clone().map(SecretString::from),
        });

    if let Some(ref tone) = cli.tone {
        builder = builder.tone(tone);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref url) = cli.chat_base_url {
        builder = builder.chat_base_url(url);
    }
    if let Some(ref key) = cli.clova_api_key {
        builder = builder.chat_api_key(key);
    }
    if let Some(ref url) = cli.tts_url {
        builder = builder.tts_url(url);
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    // TTS credentials are optional one by one; a missing half is reported
    // by the synthesizer with the variable name.
    if let Some(ref id) = cli.naver_client_id {
        builder = builder.tts_client_id(id);
    }
    if let Some(ref secret) = cli.naver_client_secret {
        builder = builder.tts_client_secret(secret);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}
