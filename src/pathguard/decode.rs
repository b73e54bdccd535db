// SPDX-License-Identifier: MIT
//! Decoding and normalization primitives used by path validation.
//!
//! Percent-decoding is capped at a fixed iteration count so stacked
//! encodings (`%252e%252e` → `%2e%2e` → `..`) cannot loop the validator.

use std::path::{Component, Path, PathBuf};

/// Maximum percent-decode passes before we stop and treat any residual
/// encoding as `double_encoding`.
pub const MAX_DECODE_ITERATIONS: usize = 3;

/// Decode `%XX` escapes once. Invalid escapes are passed through verbatim.
pub fn percent_decode_once(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(hex) = bytes.get(i + 1..i + 3) {
                if let Ok(h) = std::str::from_utf8(hex) {
                    if let Ok(v) = u8::from_str_radix(h, 16) {
                        out.push(v);
                        i += 3;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    // Decoded bytes may form overlong/invalid UTF-8 (e.g. %c0%af). Lossy
    // conversion maps those to U+FFFD, which the classifier treats like a
    // separator-smuggling marker rather than silently dropping them.
    String::from_utf8_lossy(&out).into_owned()
}

/// Result of the capped decode loop.
pub struct Decoded {
    /// Fully decoded string (up to the iteration cap).
    pub text: String,
    /// Number of passes that actually changed the string.
    pub passes: usize,
    /// `%` escapes remained after the cap — stacked deeper than we decode.
    pub residual_encoding: bool,
}

/// Run the capped percent-decode loop.
pub fn percent_decode(input: &str) -> Decoded {
    let mut text = input.to_string();
    let mut passes = 0;
    for _ in 0..MAX_DECODE_ITERATIONS {
        let next = percent_decode_once(&text);
        if next == text {
            break;
        }
        text = next;
        passes += 1;
    }
    let residual_encoding = looks_percent_encoded(&text);
    Decoded {
        text,
        passes,
        residual_encoding,
    }
}

fn looks_percent_encoded(s: &str) -> bool {
    let b = s.as_bytes();
    b.windows(3).any(|w| {
        w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit()
    })
}

/// Map Unicode homoglyphs of `.`, `/` and `\` to their ASCII forms.
///
/// Covers the fullwidth forms (U+FF0E, U+FF0F, U+FF3C), the division/set-minus
/// operators (U+2215, U+2216), one-dot leader (U+2024), and the replacement
/// character produced by overlong UTF-8 sequences such as `%c0%af`.
pub fn normalize_unicode(input: &str) -> (String, bool) {
    let mut changed = false;
    let out: String = input
        .chars()
        .map(|c| match c {
            '\u{FF0E}' | '\u{2024}' => {
                changed = true;
                '.'
            }
            '\u{FF0F}' | '\u{2215}' => {
                changed = true;
                '/'
            }
            '\u{FF3C}' | '\u{2216}' => {
                changed = true;
                '\\'
            }
            // Overlong-encoded separators decode to U+FFFD via the lossy
            // conversion; treat them as a smuggled separator.
            '\u{FFFD}' => {
                changed = true;
                '/'
            }
            c => c,
        })
        .collect();
    (out, changed)
}

/// Resolve `.` and `..` components lexically, without touching the
/// filesystem (unlike `std::fs::canonicalize`, which requires the path to
/// exist). `..` at the root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
                // Ignore .. at root
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Count how many `..` components a raw string path contains.
pub fn parent_segments(s: &str) -> usize {
    s.split(['/', '\\'])
        .filter(|seg| *seg == "..")
        .count()
}

/// True if the string carries both `/` and `\` separators.
pub fn has_mixed_separators(s: &str) -> bool {
    s.contains('/') && s.contains('\\')
}

/// True for Windows drive prefixes (`C:\`, `C:/`) and UNC paths (`\\host`).
pub fn has_windows_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    let drive = b.len() >= 3
        && b[0].is_ascii_alphabetic()
        && b[1] == b':'
        && (b[2] == b'\\' || b[2] == b'/');
    drive || s.starts_with("\\\\")
}

/// Strip traversal tokens and illegal characters from a filename so it can
/// be safely re-rooted under a sandbox.
pub fn sanitize_filename(original: &str) -> String {
    let candidate = original
        .rsplit(['/', '\\'])
        .find(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .unwrap_or("unnamed");
    let cleaned: String = candidate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
