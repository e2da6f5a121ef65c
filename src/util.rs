//! Shared utility functions for pagewright.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use std::sync::LazyLock;

static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^data:([^;,]*);base64,(.*)$").expect("valid data URI regex"));

/// Decode a base64 `data:` URI into its bytes and MIME type.
pub fn decode_data_uri(uri: &str) -> Option<(Vec<u8>, String)> {
    let caps = DATA_URI_RE.captures(uri.trim())?;
    let mime = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(payload).ok()?;
    Some((bytes, mime.to_string()))
}

/// Return the body of the first fenced code block whose info string is one of
/// `langs` (case-insensitive). The closing fence may be missing at end of text.
pub fn extract_fenced_block(text: &str, langs: &[&str]) -> Option<String> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let line_end = after_fence.find('\n')?;
        let info = after_fence[..line_end].trim().to_ascii_lowercase();
        let body = &after_fence[line_end + 1..];
        let (block, remainder) = match body.find("```") {
            Some(close) => (&body[..close], &body[close + 3..]),
            None => (body, ""),
        };
        if langs.iter().any(|l| l.eq_ignore_ascii_case(&info)) {
            return Some(block.trim_end().to_string());
        }
        rest = remainder;
    }
    None
}

/// Truncate to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n[truncated]", &text[..idx]),
        None => text.to_string(),
    }
}
