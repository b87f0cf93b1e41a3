//! Script handling: split narration into utterances and assign voices.
//!
//! A script is newline-separated; each non-blank line becomes one TTS
//! request. Models sometimes write dialogue as `Host: ...`; such a speaker
//! label is dropped so only the spoken text reaches the TTS provider.
//!
//! A prefix is only treated as a speaker label when it is label-shaped
//! (short, no digits, no sentence punctuation) and the same prefix opens at
//! least two lines of the script. A one-off `Total revenue: 3 million` or
//! `Remember this: growth doubled` keeps its full text.

use crate::config::Voice;
use std::collections::{HashMap, HashSet};

/// Longest text before a colon still treated as a speaker label (in chars).
const MAX_LABEL_CHARS: usize = 24;
/// Most words a speaker label may contain.
const MAX_LABEL_WORDS: usize = 3;
/// Lines a prefix must open before it counts as a speaker.
const MIN_LABEL_LINES: usize = 2;

/// One utterance of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 0-indexed position among the script's non-blank lines.
    pub index: usize,
    /// Speaker label that was stripped, if any.
    pub label: Option<String>,
    /// Text to speak.
    pub text: String,
}

/// Split a script into utterances, in order.
///
/// Blank lines are skipped. Lines that are nothing but a speaker label
/// (`Host:`) carry no speech and are skipped too, but still count towards
/// `index`, so voice rotation follows the script's non-blank lines.
pub fn split_lines(script: &str) -> Vec<ScriptLine> {
    let lines: Vec<&str> = script
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let speakers = recurring_labels(&lines);

    lines
        .into_iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let (label, text) = match split_label(line) {
                Some((head, rest)) if speakers.contains(head) => (Some(head), rest.trim()),
                _ => (None, line),
            };
            (!text.is_empty()).then(|| ScriptLine {
                index,
                label: label.map(str::to_string),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Split `line` into `(head, remainder)` at the first colon if the head is
/// label-shaped.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (head, rest) = line.split_once([':', '：'])?;
    let head = head.trim();
    looks_like_label(head).then_some((head, rest))
}

/// Label-shaped heads that open at least [`MIN_LABEL_LINES`] lines.
///
/// A head followed by a number (`Revenue: 3 million`) is a statement, not
/// a speaker turn, and does not count.
fn recurring_labels<'a>(lines: &[&'a str]) -> HashSet<&'a str> {
    let mut counts: HashMap<&'a str, usize> = HashMap::new();
    for line in lines.iter().copied() {
        if let Some((head, rest)) = split_label(line) {
            if !rest.trim_start().starts_with(char::is_numeric) {
                *counts.entry(head).or_default() += 1;
            }
        }
    }
    counts
        .into_iter()
        .filter(|&(_, n)| n >= MIN_LABEL_LINES)
        .map(|(head, _)| head)
        .collect()
}

fn looks_like_label(s: &str) -> bool {
    !s.is_empty()
        && s.chars().count() <= MAX_LABEL_CHARS
        && s.split_whitespace().count() <= MAX_LABEL_WORDS
        && !s.chars().any(char::is_numeric)
        && !s.contains(['.', ',', '!', '?', '"', '(', ')', '/'])
}

/// Voice for the line at `index`: `voices[index mod voices.len()]`.
///
/// Returns `None` only when `voices` is empty.
pub fn assign_voice(voices: &[Voice], index: usize) -> Option<Voice> {
    if voices.is_empty() {
        None
    } else {
        Some(voices[index % voices.len()])
    }
}
