//! Narration: ask a vision chat model for a spoken script per slide.
//!
//! The page image is never sent inline. The request carries its public URL
//! and the model fetches it, which is why pages are published first.
//!
//! ## Request Layout
//!
//! 1. **System message**: the presenter persona with the tone directive
//! 2. **User message**: the fixed narration instruction plus the image URL
//!
//! One call per page, no retries. Every failure (transport error, non-200
//! status, unparseable body, empty content) comes back as a
//! [`StageError::NarrationFailed`] whose message is shown in place of the
//! script.

use crate::config::PodcastConfig;
use crate::error::{PodcastError, StageError};
use crate::pipeline::postprocess::clean_script;
use crate::prompts::{system_prompt, NARRATION_INSTRUCTION};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Per-request correlation header expected by the chat API.
pub const REQUEST_ID_HEADER: &str = "X-NCP-CLOVASTUDIO-REQUEST-ID";

/// Longest slice of an error body kept in the error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text {
        text: &'a str,
    },
    ImageUrl {
        #[serde(rename = "imageUrl")]
        image_url: ImageUrl<'a>,
    },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    result: Option<ChatResult>,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ── Narrator ─────────────────────────────────────────────────────────────────

/// Chat-completion client that turns a slide URL into a script.
pub struct Narrator {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    max_tokens: usize,
    system_prompt: String,
}

impl Narrator {
    /// Build a narrator from the run configuration.
    ///
    /// Fails with [`PodcastError::MissingCredential`] when no API key is set,
    /// before any page is processed.
    pub fn new(config: &PodcastConfig, client: Client) -> Result<Self, PodcastError> {
        let api_key = config
            .chat
            .api_key
            .clone()
            .ok_or(PodcastError::MissingCredential {
                name: "chat API key",
                env: "CLOVA_API_KEY",
            })?;

        Ok(Self {
            client,
            endpoint: config.chat.endpoint(),
            api_key,
            max_tokens: config.chat.max_tokens,
            system_prompt: system_prompt(config.system_prompt.as_deref(), &config.tone),
        })
    }

    /// Request a script for the slide at `image_url`.
    ///
    /// The returned script has Markdown formatting stripped and is never
    /// empty.
    pub async fn narrate(&self, page: usize, image_url: &str) -> Result<String, StageError> {
        let start = Instant::now();
        match self.request(image_url).await {
            Ok(script) => {
                debug!(
                    "Page {}: script of {} chars in {:?}",
                    page,
                    script.chars().count(),
                    start.elapsed()
                );
                Ok(script)
            }
            Err(detail) => {
                warn!("Page {}: narration failed — {}", page, detail);
                Err(StageError::NarrationFailed { page, detail })
            }
        }
    }

    async fn request(&self, image_url: &str) -> Result<String, String> {
        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&self.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: NARRATION_INSTRUCTION,
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: image_url },
                        },
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose_secret())
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Chat API request failed: {e}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Chat API response unreadable: {e}"))?;

        if status != reqwest::StatusCode::OK {
            return Err(format!(
                "Chat API error: {} {}\n{}",
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                truncate(&text, MAX_ERROR_BODY_CHARS)
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| format!("Chat API returned malformed JSON: {e}"))?;

        let content = parsed
            .result
            .and_then(|r| r.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        let script = clean_script(&content);
        if script.is_empty() {
            Err("Chat API returned no content".to_string())
        } else {
            Ok(script)
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
