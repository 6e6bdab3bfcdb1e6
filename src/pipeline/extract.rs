use crate::error::GenerationError;
use serde_json::{Map, Value};

/// Title and body pulled out of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub article: String,
}

/// Strip a surrounding markdown code fence (with or without a language tag).
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.split_once('\n').map(|(_, body)| body) else {
        return text;
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Index of the `}` closing the `{` at `start`, skipping braces inside JSON strings.
fn closing_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // Every byte matched below is ASCII, so indices are char boundaries.
    for (i, byte) in text.bytes().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Top-level `{...}` spans. A `{` that never closes is skipped and the scan
/// resumes at the next one.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut pos = 0usize;

    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        match closing_brace(text, start) {
            Some(end) => {
                spans.push(&text[start..=end]);
                pos = end + 1;
            }
            None => pos = start + 1,
        }
    }

    spans
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Locate a JSON object in free-form text.
///
/// Tries, in order: the whole reply (code fence removed), each top-level
/// balanced span, and finally the greedy first-`{` to last-`}` span.
pub fn find_json_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = strip_code_fence(raw.trim());
    if let Some(map) = parse_object(trimmed) {
        return Some(map);
    }

    if let Some(map) = balanced_spans(trimmed).into_iter().find_map(parse_object) {
        return Some(map);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start)
        .then(|| parse_object(&trimmed[start..=end]))
        .flatten()
}

fn field_text(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Extract `{title, article}` from a reply. Missing fields become empty strings;
/// literal `\n` sequences in the body become line breaks.
pub fn extract_article(raw: &str) -> Result<ExtractedArticle, GenerationError> {
    let map = find_json_object(raw).ok_or_else(|| GenerationError::Parse {
        message: format!(
            "no JSON object in model reply ({} chars)",
            raw.chars().count()
        ),
    })?;

    Ok(ExtractedArticle {
        title: field_text(&map, "title").trim().to_string(),
        article: field_text(&map, "article")
            .replace("\\n", "\n")
            .trim()
            .to_string(),
    })
}
