//! Inline markup cleanup for model output.
//!
//! Analyses are rendered as HTML with two allowed emphasis forms:
//! [`MARK_OPEN`]…[`MARK_CLOSE`] for key terms and a `<span>` with
//! [`STRONG_CLASS`] for conclusions. Models regularly ignore that and emit
//! Markdown `**bold**`; [`post_process`] rewrites those spans.

use regex::Regex;
use std::sync::OnceLock;

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

/// CSS class of the strong-conclusion span.
pub const STRONG_CLASS: &str = "important-red";

fn bold_pattern() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    // `.` does not match `\n`, so a span never crosses a line break.
    BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("static regex"))
}

/// Rewrite every `**text**` span to `<mark>text</mark>`.
///
/// Matching is non-greedy and line-local: each span runs to the nearest
/// closing `**` on the same line. An unmatched `**` is left as-is.
pub fn post_process(text: &str) -> String {
    bold_pattern()
        .replace_all(text, format!("{}${{1}}{}", MARK_OPEN, MARK_CLOSE).as_str())
        .into_owned()
}

/// Wrap `text` in the strong-conclusion span.
pub fn strong(text: &str) -> String {
    format!("<span class='{}'>{}</span>", STRONG_CLASS, text)
}
