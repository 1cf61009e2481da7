//! Small text helpers shared by the scrapers, prompts and output writer.

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Collapse every run of whitespace into a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a URL-safe slug from a keyword, folding Latin accents.
///
/// `"Meilleur Aspirateur Robot 2025 !"` becomes `"meilleur-aspirateur-robot-2025"`.
pub fn slugify(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => folded.push('a'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => folded.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ç' => folded.push('c'),
            'ñ' => folded.push('n'),
            'œ' => folded.push_str("oe"),
            'æ' => folded.push_str("ae"),
            c if c.is_ascii_alphanumeric() => folded.push(c),
            c if c.is_whitespace() || c == '-' || c == '_' || c == '\'' => folded.push(' '),
            _ => {}
        }
    }

    folded.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Turn the last path segment of a URL into words (`/blog/robot-laveur/` → `robot laveur`).
pub fn slug_words(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let last = last.split(['?', '#']).next().unwrap_or(last);
    let last = last
        .strip_suffix(".html")
        .or_else(|| last.strip_suffix(".php"))
        .unwrap_or(last);
    collapse_whitespace(&last.replace(['-', '_'], " "))
}
