use std::sync::LazyLock;

use regex::Regex;

use crate::parser::clean::{collapse_whitespace, lang_text};

static LANG_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\{\{\s*lang\s*\|").unwrap());
static ITALIC_FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"italic\s*=\s*(?:yes|no)").unwrap());

/// Tidy a museum name cell, unwrapping a leftover `{{Lang|code|Name...`
/// wrapper when the template was not closed inside the cell.
pub fn clean_museum_name(cell: &str) -> String {
    let mut name = cell.trim_start_matches('|').trim().to_string();

    if LANG_PREFIX_RE.is_match(&name) {
        let parts: Vec<&str> = name.split('|').collect();
        name = lang_text(&parts).to_string();
    }

    let name = ITALIC_FLAG_RE.replace_all(&name, "");
    let name = match name.find("{{") {
        Some(idx) => &name[..idx],
        None => &name[..],
    };

    collapse_whitespace(name)
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}
