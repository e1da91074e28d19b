/// Reduce arbitrary text to something safe to use in a filename: keep
/// alphanumerics, underscores, dots, hyphens and spaces, trim, then turn the
/// remaining spaces into underscores.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | ' ' | '.' | '-'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// First `max` characters of `text` (character, not byte, boundaries).
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
