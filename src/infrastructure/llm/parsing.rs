//! Helpers for pulling structured data out of free-form model output

use once_cell::sync::Lazy;
use regex::Regex;

static UNIT_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:score\s*:\s*)?(0(?:\.\d+)?|1(?:\.0+)?|\.\d+)\.?$").unwrap()
});

/// Slice from the first `{` to the last `}`
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Slice from the first `[` to the last `]`
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

/// Remove a surrounding markdown code fence (```json ... ```)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// A reply that is nothing but a score in [0, 1], optionally labelled
/// `Score:`. Anything else, including other scales such as `7/10`, is `None`.
pub fn unit_score(text: &str) -> Option<f32> {
    UNIT_SCORE
        .captures(text.trim())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Drop a leading label such as `Answer:` and surrounding quotes
pub fn strip_label(text: &str, labels: &[&str]) -> String {
    let mut cleaned = text.trim();
    for label in labels {
        if cleaned.len() >= label.len()
            && cleaned.is_char_boundary(label.len())
            && cleaned[..label.len()].eq_ignore_ascii_case(label)
        {
            cleaned = cleaned[label.len()..].trim_start();
            break;
        }
    }

    cleaned.trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}
