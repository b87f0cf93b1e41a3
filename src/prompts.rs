//! Prompts for slide narration.
//!
//! Callers can override the system prompt via
//! [`crate::config::PodcastConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Placeholder substituted with the configured tone.
pub const TONE_PLACEHOLDER: &str = "{tone}";

/// Default system prompt. `{tone}` is replaced by the tone directive.
///
/// Every voice in the TTS catalog is Korean, so the prompts ask for a
/// Korean script.
pub const DEFAULT_SYSTEM_PROMPT: &str = "- {tone} 발표 스크립트를 작성하는 AI 발표자입니다.";

/// Fixed instruction sent with every slide image: a script of about one
/// minute, focused on the key points, without a greeting.
pub const NARRATION_INSTRUCTION: &str = "이 이미지를 보고 1분 내외 발표자가 설명하는 발표 \
스크립트를 작성해줘. 청중이 이해하기 쉽게 핵심 내용을 중심으로 설명해. 앞에 인사부분은 제외해도되.";

/// Build the system message for the given tone.
pub fn system_prompt(custom: Option<&str>, tone: &str) -> String {
    custom
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace(TONE_PLACEHOLDER, tone)
}
