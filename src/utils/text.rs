/// Character count as seen by the length constraint (Unicode scalar values).
#[must_use]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Longest prefix of `s` holding at most `max_chars` characters.
#[must_use]
pub fn clip_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Collapse every whitespace run (newlines included) into one space and trim.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_exotic_space(c: char) -> bool {
    matches!(
        c,
        '\t' | '\u{00A0}' | '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

/// Normalize uploaded plain text: unify line endings, turn tabs and exotic
/// spaces into plain spaces, squeeze space runs, allow at most one blank line.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut pending_newlines = 0usize;
    let mut last_was_space = false;

    for c in unified.chars() {
        if c == '\n' {
            pending_newlines += 1;
            last_was_space = false;
            continue;
        }
        if pending_newlines > 0 {
            out.push_str(if pending_newlines >= 2 { "\n\n" } else { "\n" });
            pending_newlines = 0;
        }
        if c == ' ' || is_exotic_space(c) {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }

    out.trim().to_string()
}
