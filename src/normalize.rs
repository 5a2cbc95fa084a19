use deunicode::deunicode;

/// Comparison key for a display name: transliterated to ASCII, lower-cased,
/// every run of non-letters collapsed to a single space, trimmed.
pub fn normalize(raw: &str) -> String {
    let folded = deunicode(raw);
    let mut out = String::with_capacity(folded.len());
    let mut prev_sep = false;
    for ch in folded.chars() {
        if ch.is_ascii_alphabetic() {
            if prev_sep && !out.is_empty() {
                out.push(' ');
            }
            out.push(ch.to_ascii_lowercase());
            prev_sep = false;
        } else {
            prev_sep = true;
        }
    }
    out
}

pub fn last_token(key: &str) -> Option<&str> {
    key.split_whitespace().last()
}
