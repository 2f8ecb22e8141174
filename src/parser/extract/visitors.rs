use std::sync::LazyLock;

use regex::Regex;

use crate::parser::clean::strip_refs;

static YEAR_NOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?:19|20)\d{2}\)").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,.]*").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorCount {
    pub count: Option<u64>,
    /// The cell exactly as it came in, kept for auditing.
    pub raw: String,
}

/// Pull the visitor figure out of a cell like `8,700,000 (2023)[1]`.
///
/// Thousands separators (comma, period, space) are dropped. This is best
/// effort: a decimal figure such as `1.2 million` reads as `12`.
pub fn parse_visitors(cell: &str) -> VisitorCount {
    let text = strip_refs(cell);
    let text = YEAR_NOTE_RE.replace_all(&text, "");
    let text = text.replace(' ', "");

    let count = NUMBER_RE.find(&text).and_then(|m| {
        let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    });

    VisitorCount {
        count,
        raw: cell.to_string(),
    }
}
