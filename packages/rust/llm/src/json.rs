use std::sync::LazyLock;

use regex::Regex;

/// Strip Markdown code fences (```` ```json ```` / ```` ``` ````) and surrounding whitespace.
pub fn clean_json(text: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```json\n?|\n?```").expect("valid regex"));

    FENCE_RE.replace_all(text, "").trim().to_string()
}
