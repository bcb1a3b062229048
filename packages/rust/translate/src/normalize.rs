//! Character classification and slug-fragment normalization.

use sha2::{Digest, Sha256};

/// Whether `c` is a CJK ideograph (unified, extensions A/B, compatibility).
pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

/// Whether the text contains at least one CJK ideograph.
pub fn has_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Turn raw backend output into a slug fragment.
///
/// Lowercases, drops punctuation and non-ASCII letters, joins words with
/// single hyphens and truncates to `max_len` bytes, preferring a word
/// boundary.
pub fn normalize_fragment(raw: &str, max_len: usize) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
        } else if c.is_whitespace() || matches!(c, '-' | '_' | '/' | '&' | '+') {
            cleaned.push(' ');
        }
    }

    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    truncate_fragment(&joined, max_len)
}

/// Truncate an ASCII fragment to `max_len`, cutting at the last hyphen when
/// that still leaves something. Never returns a trailing hyphen.
pub fn truncate_fragment(fragment: &str, max_len: usize) -> String {
    if fragment.len() <= max_len {
        return fragment.trim_matches('-').to_string();
    }

    let head = &fragment[..max_len];
    let at_boundary = fragment.as_bytes().get(max_len) == Some(&b'-');
    let cut = if at_boundary {
        head
    } else {
        match head.rfind('-') {
            Some(pos) if pos > 0 => &head[..pos],
            _ => head,
        }
    };
    cut.trim_matches('-').to_string()
}

/// First eight hex characters of the SHA-256 of `text`.
pub fn short_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// Deterministic `<prefix>-<8hex>` placeholder for untranslatable input.
pub fn hash_fragment(prefix: &str, text: &str) -> String {
    format!("{prefix}-{}", short_hash(text))
}
