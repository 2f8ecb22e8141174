/// Rank cells look like `12`, `12(new)` or `—`; anything without digits has
/// no rank.
pub fn parse_rank(cell: &str) -> Option<u32> {
    let digits: String = cell
        .trim()
        .replace("(new)", "")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_annotated() {
        assert_eq!(parse_rank("1"), Some(1));
        assert_eq!(parse_rank(" 12(new) "), Some(12));
        assert_eq!(parse_rank("=7"), Some(7));
    }

    #[test]
    fn no_digits_is_absent() {
        assert_eq!(parse_rank("—"), None);
        assert_eq!(parse_rank(""), None);
        assert_eq!(parse_rank("(new)"), None);
    }

    #[test]
    fn overflow_is_absent() {
        assert_eq!(parse_rank("99999999999999"), None);
    }
}
