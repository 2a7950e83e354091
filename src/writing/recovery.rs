//! Pulls usable text out of model responses that were meant to be JSON but
//! often arrive fenced, wrapped in commentary, or cut off mid-string.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Text recovered from a revision response and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub text: String,
    pub strategy: &'static str,
}

type Strategy = fn(&str) -> Option<String>;

const STRATEGIES: [(&str, Strategy); 4] = [
    ("structured", from_structured_record),
    ("labelled", from_labelled_section),
    ("prose", from_prose_lines),
    ("raw", from_raw),
];

/// Runs the strategies in order; the first candidate that reads as prose wins.
pub fn recover_revision(raw: &str, min_chars: usize) -> Option<Recovered> {
    for (name, strategy) in STRATEGIES {
        let Some(candidate) = strategy(raw) else {
            continue;
        };
        let candidate = candidate.trim();
        if looks_like_prose(candidate, min_chars) {
            return Some(Recovered {
                text: candidate.to_string(),
                strategy: name,
            });
        }
        debug!(strategy = name, chars = candidate.chars().count(), "candidate rejected");
    }
    None
}

/// More than `min_chars` characters and not a bare JSON document.
pub fn looks_like_prose(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() > min_chars && !trimmed.starts_with('{') && !trimmed.starts_with('[')
}

/// Removes markdown code fence lines, keeping their contents.
pub fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// From the first `{` to the last `}`.
pub fn largest_brace_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses the largest brace block of a possibly fenced response.
pub fn parse_record<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let stripped = strip_fences(raw);
    let block = largest_brace_block(&stripped)?;
    serde_json::from_str(block).ok()
}

fn from_structured_record(raw: &str) -> Option<String> {
    let record: Value = parse_record(raw)?;
    record
        .get("revisedText")
        .and_then(Value::as_str)
        .map(str::to_string)
}

static TRUNCATED_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""revisedText"\s*:\s*""#).unwrap());

static REVISED_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)revised[ _]text\**\s*[:：]\**[ \t]*").unwrap());

static NEXT_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t#*]*(improvement[ _]summary|summary of (improvements|changes)|changes)\**\s*[:：]")
        .unwrap()
});

fn from_labelled_section(raw: &str) -> Option<String> {
    if let Some(found) = TRUNCATED_FIELD_RE.find(raw) {
        let value = read_json_string_prefix(&raw[found.end()..]);
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    let found = REVISED_LABEL_RE.find(raw)?;
    let rest = &raw[found.end()..];
    let section = match NEXT_SECTION_RE.find(rest) {
        Some(next) => &rest[..next.start()],
        None => rest,
    };
    Some(strip_fences(section))
}

/// Decodes a JSON string body up to its closing quote, or to the end of input
/// when the response was cut off.
fn read_json_string_prefix(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => {}
                Some('u') => {
                    let code: String = chars.by_ref().take(4).collect();
                    if let Some(decoded) = u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                        out.push(decoded);
                    }
                }
                Some(other) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    out
}

fn is_structural_noise(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with("```") {
        return true;
    }
    if matches!(trimmed, "{" | "}" | "[" | "]" | "}," | "]," | "{}" | "[]") {
        return true;
    }
    // "key": value
    trimmed.starts_with('"') && trimmed.contains("\":")
}

fn from_prose_lines(raw: &str) -> Option<String> {
    let kept: Vec<&str> = raw.lines().filter(|line| !is_structural_noise(line)).collect();
    if kept.iter().all(|line| line.trim().is_empty()) {
        return None;
    }
    Some(kept.join("\n"))
}

fn from_raw(raw: &str) -> Option<String> {
    Some(raw.to_string())
}
