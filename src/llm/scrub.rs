use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 500;

const PREFIX_PATTERNS: [&str; 3] = ["sk-", "eyJ", "AIza"];

const MARKER_PATTERNS: [&str; 8] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "\"authorization\":\"Bearer ",
    "api_key=",
    "access_token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"token\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn token_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|(_, c)| !is_secret_char(*c))
        .map_or(input.len(), |(i, _)| from + i)
}

/// Replace every token following `marker` with `[REDACTED]`.
fn redact_after(scrubbed: &mut String, marker: &str, keep_marker: bool) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let value_start = start + marker.len();
        let end = token_end(scrubbed, value_start);

        // Bare marker without a value, or a prefix embedded in a longer word.
        let embedded = !keep_marker
            && scrubbed[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
        if end == value_start || embedded {
            search_from = value_start;
            continue;
        }

        let replace_from = if keep_marker { value_start } else { start };
        scrubbed.replace_range(replace_from..end, "[REDACTED]");
        search_from = replace_from + "[REDACTED]".len();
    }
}

/// Redact provider keys and bearer tokens that upstream APIs sometimes echo
/// back in error bodies.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let needs_scrubbing = PREFIX_PATTERNS
        .iter()
        .chain(MARKER_PATTERNS.iter())
        .any(|pattern| input.contains(pattern));
    if !needs_scrubbing {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for pattern in PREFIX_PATTERNS {
        redact_after(&mut scrubbed, pattern, false);
    }
    for marker in MARKER_PATTERNS {
        redact_after(&mut scrubbed, marker, true);
    }
    Cow::Owned(scrubbed)
}

/// Pull `error.message` (or a top-level `message`) out of a JSON error body;
/// anything else is returned trimmed as-is.
pub fn extract_api_error_message(raw: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(raw).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .or_else(|| value.get("error").filter(|e| e.is_string()))
                .and_then(serde_json::Value::as_str)
        })
        .unwrap_or(raw)
        .trim()
        .to_string()
}

/// Sanitize API error text: extract the message, scrub secrets, cap length.
pub fn sanitize_api_error(input: &str) -> String {
    let message = extract_api_error_message(input);
    let scrubbed = scrub_secret_patterns(&message);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let truncated: String = scrubbed.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}
