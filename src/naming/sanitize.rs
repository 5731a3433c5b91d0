/// Substitute for characters that cannot appear in a file or directory name.
pub const REPLACEMENT: char = '_';

/// Characters rejected by at least one common filesystem
fn is_unsafe(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Make a metadata value usable as (part of) one path segment.
///
/// Separators, reserved punctuation and control characters become `_`, the
/// result is trimmed, and a value made only of dots is replaced so it cannot
/// name the current or parent directory.
pub fn sanitize_segment(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| if is_unsafe(c) { REPLACEMENT } else { c })
        .collect();
    let trimmed = replaced.trim();

    if !trimmed.is_empty() && trimmed.chars().all(|c| c == '.') {
        return REPLACEMENT.to_string().repeat(trimmed.chars().count());
    }
    trimmed.to_string()
}
