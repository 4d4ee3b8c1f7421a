//! Derived text fields: content abstracts and humanized timestamps.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Character budget of a derived abstract.
pub const ABSTRACT_LEN: usize = 200;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static LINE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(#{1,6}|>+|[-*+]|\d+\.)\s+").unwrap());
/// Paired delimiters around non-space text, strongest first. Underscores
/// only count at word boundaries so `snake_case` survives.
static EMPHASIS: Lazy<[Regex; 6]> = Lazy::new(|| {
    [
        r"\*\*(\S(?:.*?\S)?)\*\*",
        r"\b__(\S(?:.*?\S)?)__\b",
        r"~~(\S(?:.*?\S)?)~~",
        r"\*(\S(?:.*?\S)?)\*",
        r"\b_(\S(?:.*?\S)?)_\b",
        r"`([^`]+)`",
    ]
    .map(|pattern| Regex::new(pattern).unwrap())
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Plain-text abstract of a markdown/HTML body, at most [`ABSTRACT_LEN`]
/// characters plus a trailing ellipsis when cut.
pub fn make_abstract(body: &str) -> String {
    let text = CODE_FENCE.replace_all(body, " ");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = LINE_MARKER.replace_all(&text, "");
    let text = EMPHASIS
        .iter()
        .fold(text.into_owned(), |text, re| re.replace_all(&text, "$1").into_owned());
    let text = WHITESPACE.replace_all(&text, " ");
    truncate_chars(text.trim(), ABSTRACT_LEN)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// "just now", "5 minutes ago", "in 2 hours", ...
pub fn humanize(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(at);
    let secs = delta.num_seconds();
    if secs.abs() < 45 {
        return "just now".to_string();
    }
    let (amount, unit) = match secs.abs() {
        s if s < 3_600 => ((s + 30) / 60, "minute"),
        s if s < 86_400 => ((s + 1_800) / 3_600, "hour"),
        s if s < 2_592_000 => ((s + 43_200) / 86_400, "day"),
        s if s < 31_536_000 => ((s + 1_296_000) / 2_592_000, "month"),
        s => ((s + 15_768_000) / 31_536_000, "year"),
    };
    let amount = amount.max(1);
    let plural = if amount == 1 { "" } else { "s" };
    if secs >= 0 {
        format!("{amount} {unit}{plural} ago")
    } else {
        format!("in {amount} {unit}{plural}")
    }
}
