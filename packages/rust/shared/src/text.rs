//! Text helpers for prompt construction.

/// Search-context budget for URL extraction.
pub const SEARCH_CONTEXT_CHARS: usize = 40_000;
/// News-context budget for the news analysis call.
pub const NEWS_CONTEXT_CHARS: usize = 20_000;
/// Page text budget for page analysis.
pub const PAGE_TEXT_CHARS: usize = 40_000;
/// Analysis budget for the final structured synthesis call.
pub const SYNTHESIS_ANALYSIS_CHARS: usize = 20_000;
/// Analysis budget for the news JSON extraction call.
pub const NEWS_ANALYSIS_CHARS: usize = 5_000;

/// Keep printable ASCII plus `\n`, `\r` and `\t`; drop everything else.
pub fn sanitize_ascii(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(c, '\x20'..='\x7E' | '\n' | '\r' | '\t'))
        .collect()
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
