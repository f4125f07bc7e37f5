//! Address-style text normalization.
//!
//! `normalize_text(normalize_text(s)) == normalize_text(s)` for every `s`:
//! each step maps its own output to itself. Case mapping is ASCII-only
//! because full Unicode case mapping can change length and is not stable
//! under repetition.

/// Street-type abbreviations expanded during normalization.
const ABBREVIATIONS: [(&str, &str); 6] = [
    ("st", "Street"),
    ("ave", "Avenue"),
    ("rd", "Road"),
    ("blvd", "Boulevard"),
    ("ln", "Lane"),
    ("dr", "Drive"),
];

fn keep_char(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || matches!(c, ',' | '#' | '-' | '/' | '\'' | '&')
}

/// Strip stray punctuation, collapse whitespace, title-case each token and
/// expand common street abbreviations.
pub fn normalize_text(input: &str) -> String {
    let cleaned: String = input.chars().filter(|&c| keep_char(c)).collect();
    cleaned
        .split_whitespace()
        .map(normalize_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_token(token: &str) -> String {
    let core = token.trim_end_matches(',');
    let tail = &token[core.len()..];

    if let Some((_, full)) = ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| core.eq_ignore_ascii_case(abbr))
    {
        return format!("{}{}", full, tail);
    }

    let mut out = String::with_capacity(token.len());
    for (i, c) in token.chars().enumerate() {
        if i == 0 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}
