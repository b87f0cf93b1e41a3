//! Post-processing: deterministic cleanup of model-written scripts.
//!
//! Scripts go straight to a TTS engine, which reads every character it is
//! given. Chat models still like to format their answers as Markdown, so a
//! `**bold**` phrase or a `- ` bullet would be spoken as noise (or read out
//! as "asterisk asterisk"). These passes strip that formatting without
//! touching the words themselves.
//!
//! ## Rule Order
//!
//! The outer fence is stripped first, while the reply is still one block.
//! Line-level markers are removed before blank lines are collapsed so a
//! line that held only `---` disappears cleanly.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model reply.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (```` ``` ```` / ```` ```text ````)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Drop heading markers, bullet markers and horizontal rules
/// 5. Unwrap inline emphasis and code spans
/// 6. Trim each line and collapse runs of blank lines
pub fn clean_script(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = strip_line_markers(&s);
    let s = unwrap_inline_markup(&s);
    tidy_lines(&s)
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible characters ──────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 4: Line-level markers ───────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+•]\s+").unwrap());
static RE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*>\s?").unwrap());
static RE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap());

fn strip_line_markers(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            if RE_RULE.is_match(line) {
                return String::new();
            }
            let line = RE_HEADING.replace(line, "");
            let line = RE_QUOTE.replace(&line, "");
            RE_BULLET.replace(&line, "").into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Inline markup ────────────────────────────────────────────────────

static RE_STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\*\*|__)([^\n]+?)(\*\*|__)").unwrap());
static RE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static RE_CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

fn unwrap_inline_markup(input: &str) -> String {
    let s = RE_STRONG.replace_all(input, "$2");
    let s = RE_EMPHASIS.replace_all(&s, "$1");
    RE_CODE_SPAN.replace_all(&s, "$1").into_owned()
}

// ── Rule 6: Tidy lines ───────────────────────────────────────────────────────

fn tidy_lines(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in input.lines().map(str::trim) {
        if line.is_empty() && matches!(out.last(), None | Some(&"")) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
