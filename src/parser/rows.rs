use std::sync::LazyLock;

use regex::Regex;

static ROW_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n\|-\r?\n").unwrap());

/// Split a table block into data row blocks.
///
/// The block before the first `|-` line is the caption/attribute preamble and
/// is dropped. Header rows (`!`) and empty blocks are skipped, and a block
/// opening with the close marker ends the table.
pub fn segment_rows(table: &str) -> Vec<&str> {
    let body = strip_closing_line(table);
    let mut rows = Vec::new();

    for part in ROW_SEPARATOR_RE.split(body).skip(1) {
        let row = part.trim_start();
        if row.starts_with("|}") {
            break;
        }
        if !row.starts_with('|') {
            continue;
        }
        rows.push(row);
    }

    rows
}

/// Split one row block into raw cells on `||`.
///
/// Line breaks inside a cell are folded into a single space; a line break
/// followed by a cell or header marker is kept as-is.
pub fn split_cells(row: &str) -> Vec<String> {
    let text = row.replace('\r', "");
    let text = text.trim_start();
    let text = text.strip_prefix('|').unwrap_or(text);

    fold_continuation_lines(text)
        .split("||")
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Drop the outermost `|}` so it doesn't leak into the last row's final cell.
fn strip_closing_line(table: &str) -> &str {
    let trimmed = table.trim_end();
    match trimmed.rfind('\n') {
        Some(idx) if trimmed[idx + 1..].trim() == "|}" => &trimmed[..idx + 1],
        _ => trimmed,
    }
}

fn fold_continuation_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\n' && !matches!(chars.peek(), Some('|') | Some('!')) {
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}
