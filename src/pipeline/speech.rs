//! Speech synthesis: one TTS request per script line.
//!
//! The provider answers a form-encoded POST with raw MP3 bytes, which are
//! written to `tts_<voice>_<6 hex>.mp3` inside the run directory. Any
//! non-success status fails the line; the caller reports it and moves on.

use crate::config::{PodcastConfig, Voice};
use crate::error::{PodcastError, StageError};
use crate::output::AudioClip;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Client-id header of the TTS gateway.
pub const CLIENT_ID_HEADER: &str = "X-NCP-APIGW-API-KEY-ID";
/// Client-secret header of the TTS gateway.
pub const CLIENT_SECRET_HEADER: &str = "X-NCP-APIGW-API-KEY";

/// Output container requested from the provider.
const AUDIO_FORMAT: &str = "mp3";

/// TTS client bound to one run directory.
pub struct SpeechSynthesizer {
    client: Client,
    url: String,
    client_id: SecretString,
    client_secret: SecretString,
    speed: i32,
    out_dir: PathBuf,
}

impl SpeechSynthesizer {
    /// Build a synthesizer writing its clips into `out_dir`.
    pub fn new(
        config: &PodcastConfig,
        client: Client,
        out_dir: impl Into<PathBuf>,
    ) -> Result<Self, PodcastError> {
        let client_id = config
            .tts
            .client_id
            .clone()
            .ok_or(PodcastError::MissingCredential {
                name: "TTS client id",
                env: "NAVER_CLIENT_ID",
            })?;
        let client_secret =
            config
                .tts
                .client_secret
                .clone()
                .ok_or(PodcastError::MissingCredential {
                    name: "TTS client secret",
                    env: "NAVER_CLIENT_SECRET",
                })?;

        Ok(Self {
            client,
            url: config.tts.url.clone(),
            client_id,
            client_secret,
            speed: config.speed,
            out_dir: out_dir.into(),
        })
    }

    /// Synthesize `text` with `voice` and persist the clip.
    ///
    /// `page` and `line` (both 1-indexed) only label the result and errors.
    pub async fn synthesize(
        &self,
        page: usize,
        line: usize,
        text: &str,
        voice: Voice,
    ) -> Result<AudioClip, StageError> {
        match self.request(text, voice).await {
            Ok(path) => {
                debug!("Page {} line {}: {} → {}", page, line, voice, path.display());
                Ok(AudioClip {
                    path,
                    voice,
                    page_num: page,
                    line,
                })
            }
            Err(detail) => {
                warn!("Page {} line {}: TTS failed — {}", page, line, detail);
                Err(StageError::SynthesisFailed {
                    page,
                    line,
                    voice: voice.to_string(),
                    detail,
                })
            }
        }
    }

    async fn request(&self, text: &str, voice: Voice) -> Result<PathBuf, String> {
        let speed = self.speed.to_string();
        let form = [
            ("speaker", voice.as_str()),
            ("speed", speed.as_str()),
            ("format", AUDIO_FORMAT),
            ("text", text),
        ];

        let response = self
            .client
            .post(&self.url)
            .header(CLIENT_ID_HEADER, self.client_id.expose_secret())
            .header(CLIENT_SECRET_HEADER, self.client_secret.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("TTS request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("TTS API error: {} {}", status, body.trim()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("TTS response unreadable: {e}"))?;
        if bytes.is_empty() {
            return Err("TTS API returned an empty body".to_string());
        }

        let path = clip_path(&self.out_dir, voice);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
        Ok(path)
    }
}

/// Fresh clip path: `<dir>/tts_<voice>_<6 hex>.mp3`.
pub fn clip_path(dir: &Path, voice: Voice) -> PathBuf {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    dir.join(format!("tts_{}_{}.{}", voice, &suffix[..6], AUDIO_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn synthesizer_for(server: &MockServer, dir: &Path) -> SpeechSynthesizer {
        let config = PodcastConfig::builder()
            .tts_url(format!("{}/tts-premium/v1/tts", server.uri()))
            .tts_credentials("id-123", "secret-456")
            .speed(-1)
            .build()
            .unwrap();
        SpeechSynthesizer::new(&config, Client::new(), dir).unwrap()
    }

    #[test]
    fn clip_path_names_voice() {
        let p = clip_path(Path::new("/tmp/run"), Voice::NesCHyeri);
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tts_nes_c_hyeri_"), "got: {name}");
        assert!(name.ends_with(".mp3"));
        assert_eq!(name.len(), "tts_nes_c_hyeri_".len() + 6 + ".mp3".len());
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let config = PodcastConfig::default();
        let err = SpeechSynthesizer::new(&config, Client::new(), "/tmp")
            .err()
            .unwrap();
        assert!(err.to_string().contains("NAVER_CLIENT_ID"));
    }

    #[tokio::test]
    async fn writes_clip_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(CLIENT_ID_HEADER, "id-123"))
            .and(header(CLIENT_SECRET_HEADER, "secret-456"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("speaker=ndain"))
            .and(body_string_contains("speed=-1"))
            .and(body_string_contains("format=mp3"))
            .and(body_string_contains("text=Hello+world"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x64]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let clip = synthesizer_for(&server, dir.path())
            .synthesize(2, 1, "Hello world", Voice::Ndain)
            .await
            .unwrap();

        assert_eq!(clip.voice, Voice::Ndain);
        assert_eq!((clip.page_num, clip.line), (2, 1));
        assert!(clip.path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&clip.path).unwrap(), vec![0xFF, 0xFB, 0x90, 0x64]);
    }

    #[tokio::test]
    async fn non_success_fails_the_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Authentication Failed"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = synthesizer_for(&server, dir.path())
            .synthesize(1, 3, "text", Voice::Neunwoo)
            .await
            .unwrap_err();

        match &err {
            StageError::SynthesisFailed {
                page, line, voice, ..
            } => {
                assert_eq!((*page, *line), (1, 3));
                assert_eq!(voice, "neunwoo");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("401"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
