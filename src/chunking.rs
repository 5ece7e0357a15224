//! Splitting documents into passages and fitting them to the model's
//! document length.
//!
//! Token budgets are converted to character budgets with a fixed
//! approximation of 4 characters per token, which holds well enough for
//! English conversational text.

/// Approximate characters per token for English text.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default maximum document length in tokens.
pub const DEFAULT_MAX_DOCUMENT_LENGTH: usize = 180;

/// Character budget for a token budget.
pub fn chars_for_tokens(tokens: usize) -> usize {
    tokens.saturating_mul(CHARS_PER_TOKEN).max(1)
}

/// A passage cut from a larger document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// ID of the document the passage belongs to.
    pub document_id: String,
    /// Zero-based passage index within the document.
    pub index: usize,
    pub content: String,
}

/// Split text into non-overlapping windows of at most `chunk_size`
/// characters, breaking at whitespace where possible.
///
/// Text no longer than `chunk_size` comes back as a single window.
/// Whitespace-only windows are dropped. Multi-byte characters are never
/// split.
///
/// # Examples
///
/// ```
/// use chatbert::chunking::split_text;
///
/// assert_eq!(split_text("Hello, world!", 1000), vec!["Hello, world!"]);
///
/// let text = "word ".repeat(500);
/// assert!(split_text(&text, 1000).len() >= 2);
/// ```
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let char_count = text.chars().count();

    if char_count <= chunk_size {
        return if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut windows = Vec::new();
    let mut start_char = 0;

    while start_char < char_count {
        let end_char = (start_char + chunk_size).min(char_count);
        let cut = if end_char < char_count {
            find_word_boundary_char(text, &char_to_byte, start_char, end_char)
        } else {
            end_char
        };

        let window = &text[char_to_byte[start_char]..char_to_byte[cut]];
        if !window.trim().is_empty() {
            windows.push(window.trim().to_string());
        }
        start_char = cut;
    }

    windows
}

/// Find the char position just after the last whitespace in
/// `(floor, pos_char]`, looking back at most 100 chars. Falls back to
/// `pos_char` so progress is always made.
fn find_word_boundary_char(
    text: &str,
    char_to_byte: &[usize],
    floor: usize,
    pos_char: usize,
) -> usize {
    let search_start_char = pos_char.saturating_sub(100).max(floor + 1);
    if search_start_char >= pos_char {
        return pos_char;
    }

    let start_byte = char_to_byte[search_start_char];
    let end_byte = char_to_byte[pos_char];
    let region = &text[start_byte..end_byte];

    if let Some(ws_offset) = region.rfind(char::is_whitespace) {
        let ws_byte = start_byte + ws_offset;
        // Index of the char following the whitespace.
        return char_to_byte.partition_point(|&b| b <= ws_byte);
    }

    pos_char
}

/// Split one document into passages of roughly `max_tokens` tokens.
pub fn split_document(
    document_id: &str,
    text: &str,
    max_tokens: usize,
) -> Vec<Passage> {
    split_text(text, chars_for_tokens(max_tokens))
        .into_iter()
        .enumerate()
        .map(|(index, content)| Passage {
            document_id: document_id.to_string(),
            index,
            content,
        })
        .collect()
}

/// Cut `text` down to roughly `max_tokens` tokens, at a word boundary when
/// one is near. Short text is returned as-is.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let limit = chars_for_tokens(max_tokens);
    let Some((cut_byte, _)) = text.char_indices().nth(limit) else {
        return text;
    };

    let head = &text[..cut_byte];
    match head.rfind(char::is_whitespace) {
        Some(ws) if ws > 0 && head.len() - ws <= 100 => head[..ws].trim_end(),
        _ => head,
    }
}

/// Truncate for display: at most `max_chars` characters.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_window() {
        assert_eq!(split_text("Hello, world!", 1000), vec!["Hello, world!"]);
    }

    #[test]
    fn blank_text_has_no_windows() {
        assert!(split_text("   \n ", 1000).is_empty());
        assert!(split_document("d", "", 10).is_empty());
    }

    #[test]
    fn windows_respect_size_and_cover_text() {
        let text = "word ".repeat(500);
        let windows = split_text(&text, 100);

        assert!(windows.len() >= 25);
        for w in &windows {
            assert!(w.chars().count() <= 100);
            assert!(!w.starts_with(' '));
        }
        let words: usize =
            windows.iter().map(|w| w.split_whitespace().count()).sum();
        assert_eq!(words, 500);
    }

    #[test]
    fn unbroken_text_is_cut_hard() {
        let text = "a".repeat(250);
        let windows = split_text(&text, 100);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].len(), 50);
    }

    #[test]
    fn handles_multibyte_chars() {
        let text = "café ☕ naïve 日本語 🎉 ".repeat(50);
        let windows = split_text(&text, 37);
        assert!(!windows.is_empty());
        for w in &windows {
            assert!(w.chars().count() <= 37);
        }
    }

    #[test]
    fn split_document_numbers_passages() {
        let text = "alpha beta gamma delta ".repeat(40);
        let passages = split_document("miyazaki", &text, 20);
        assert!(passages.len() > 1);
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.index, i);
            assert_eq!(p.document_id, "miyazaki");
        }
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_to_tokens("short text", 180), "short text");
    }

    #[test]
    fn truncate_cuts_at_word_boundary() {
        let text = "word ".repeat(100);
        let cut = truncate_to_tokens(&text, 10);
        assert!(cut.len() <= 40);
        assert!(cut.ends_with("word"));
    }

    #[test]
    fn excerpt_is_char_safe() {
        assert_eq!(excerpt("日本語テキスト", 3), "日本語");
        assert_eq!(excerpt("abc", 500), "abc");
    }
}
