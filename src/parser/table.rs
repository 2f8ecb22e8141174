use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::ParseError;

static TABLE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\|\s*class="wikitable sortable""#).unwrap());

/// Find the first sortable wikitable and return its text, up to and including
/// the `|}` line that balances its opening `{|`.
///
/// Nested tables reuse the same delimiters, so the scan keeps a depth counter
/// instead of stopping at the first `|}`.
pub fn locate_table(markup: &str) -> Result<&str, ParseError> {
    let start = TABLE_START_RE
        .find(markup)
        .ok_or(ParseError::TableNotFound)?
        .start();
    let rest = &markup[start..];

    let mut depth = 0usize;
    let mut end = 0;
    for line in rest.split_inclusive('\n') {
        end += line.len();
        let trimmed = line.trim();
        if trimmed.starts_with("{|") {
            depth += 1;
        } else if trimmed == "|}" {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                debug!(offset = start, bytes = end, "located table block");
                return Ok(&rest[..end]);
            }
        }
    }

    warn!(depth, "table block never closes; taking the rest of the document");
    Ok(rest)
}
