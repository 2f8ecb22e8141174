use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static REF_SELF_CLOSING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<ref[^>/]*/>").unwrap());
static REF_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<ref.*?</ref>").unwrap());
static WIKI_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^|\]]+)(?:\|([^\]]+))?\]\]").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static FLAG_TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\s*flag(?:icon|country)?\s*\|[^{}]*\}\}").unwrap());
static LANG_TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{(\s*lang\s*\|[^{}]*)\}\}").unwrap());
static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Reduce a raw cell to plain text.
///
/// Steps run in order: citations, wiki links, HTML tags, templates,
/// `&nbsp;`, whitespace. Stripping a tag or template can expose new markup
/// (`[<b></b>[X]]`), so passes repeat until the text stops changing. No pass
/// lengthens the text, so this terminates.
pub fn clean_cell(raw: &str) -> String {
    let mut text = clean_pass(raw);
    loop {
        let next = clean_pass(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn clean_pass(raw: &str) -> String {
    let text = strip_refs(raw);
    let text = resolve_links(&text);
    let text = TAG_RE.replace_all(&text, "");
    let text = strip_templates(&text);
    let text = text.replace("&nbsp;", " ");
    collapse_whitespace(&text)
}

/// Remove `<ref .../>` and `<ref>...</ref>` citation spans.
pub fn strip_refs(text: &str) -> String {
    let text = REF_SELF_CLOSING_RE.replace_all(text, "");
    REF_PAIR_RE.replace_all(&text, "").into_owned()
}

/// `[[target|display]]` becomes `display`, `[[target]]` becomes `target`.
pub fn resolve_links(text: &str) -> Cow<'_, str> {
    WIKI_LINK_RE.replace_all(text, |caps: &Captures| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    })
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Pick the display text from a language template split on `|`
/// (`lang`, language code, text, options...). Short templates fall back to
/// their last part.
pub fn lang_text<'a>(parts: &[&'a str]) -> &'a str {
    parts.get(2).or(parts.last()).copied().unwrap_or("").trim()
}

/// Flag icons render no text and are dropped; closed language templates
/// keep their text. Any other closed template is removed, innermost first.
fn strip_templates(text: &str) -> String {
    let text = FLAG_TEMPLATE_RE.replace_all(text, "");
    let mut text = LANG_TEMPLATE_RE
        .replace_all(&text, |caps: &Captures| {
            let parts: Vec<&str> = caps[1].split('|').collect();
            lang_text(&parts).to_string()
        })
        .into_owned();

    while TEMPLATE_RE.is_match(&text) {
        text = TEMPLATE_RE.replace_all(&text, "").into_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_and_self_closing_refs() {
        assert_eq!(
            clean_cell("8,700,000<ref name=\"tea\">{{cite web|title=X}}</ref> (2024)<ref name=\"tea\"/>"),
            "8,700,000 (2024)"
        );
        assert_eq!(clean_cell("A<REF>multi\nline</Ref>B"), "AB");
    }

    #[test]
    fn self_closing_ref_does_not_swallow_text() {
        assert_eq!(clean_cell("A<ref name=x/> kept <ref>gone</ref>"), "A kept");
    }

    #[test]
    fn links_resolve_to_display_text() {
        assert_eq!(clean_cell("[[Louvre]]"), "Louvre");
        assert_eq!(clean_cell("[[Louvre Museum|Louvre]]"), "Louvre");
        assert_eq!(clean_cell("[[France]], [[Paris]]"), "France, Paris");
    }

    #[test]
    fn tags_removed() {
        assert_eq!(clean_cell("Tate<br/>Modern"), "TateModern");
        assert_eq!(clean_cell("<small>Tate Modern</small>"), "Tate Modern");
    }

    #[test]
    fn templates() {
        assert_eq!(clean_cell("{{flagicon|FRA}} France, Paris"), "France, Paris");
        assert_eq!(clean_cell("{{lang|fr|Musée d'Orsay|italic=no}}"), "Musée d'Orsay");
        assert_eq!(clean_cell("Rijksmuseum {{sort|x|{{dagger}}}}"), "Rijksmuseum");
    }

    #[test]
    fn unclosed_template_left_alone() {
        assert_eq!(clean_cell("{{Lang|fr|Musée"), "{{Lang|fr|Musée");
    }

    #[test]
    fn nbsp_and_whitespace() {
        assert_eq!(clean_cell("  6,479,952&nbsp;\n (2024)\t"), "6,479,952 (2024)");
    }

    #[test]
    fn idempotent_on_clean_output() {
        let samples = [
            "[[Louvre]] <ref>x</ref>",
            "{{flagicon|USA}} United States New York City",
            "{{lang|ja|Tokyo National Museum}}&nbsp;(TNM)",
            "  plain   text  ",
            "{{Lang|fr|Musée",
            "[<b></b>[Louvre]]",
            "[{{dagger}}[Louvre Museum|Louvre]]",
            "<<ref/>b>Prado",
            "",
        ];
        for s in samples {
            let once = clean_cell(s);
            assert_eq!(clean_cell(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn markup_exposed_by_stripping_is_resolved() {
        assert_eq!(clean_cell("[<b></b>[Louvre]]"), "Louvre");
        assert_eq!(clean_cell("[{{dagger}}[Louvre Museum|Louvre]]"), "Louvre");
        assert_eq!(clean_cell("{<small></small>{efn|note}} Prado"), "Prado");
    }

    #[test]
    fn lang_text_fallbacks() {
        assert_eq!(lang_text(&["lang", "fr", "Louvre", "italic=no"]), "Louvre");
        assert_eq!(lang_text(&["lang", "fr"]), "fr");
        assert_eq!(lang_text(&[]), "");
    }
}
