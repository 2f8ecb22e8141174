use std::collections::HashMap;
use std::sync::LazyLock;

/// Known bad whitespace splits, keyed on the naive `(country, city)` result.
/// Add new entries here; the splitting rules stay untouched.
const CORRECTIONS: &[((&str, &str), (&str, &str))] = &[
    (("United States New York", "City"), ("United States", "New York City")),
    (("United States Washington", "D.C."), ("United States", "Washington, D.C.")),
    (("United States Los", "Angeles"), ("United States", "Los Angeles")),
    (
        ("United States Grand Rapids Charter Township", "Michigan"),
        ("United States", "Grand Rapids Charter Township"),
    ),
    (("United States San Marino", "California"), ("United States", "San Marino")),
    (("United States New", "Orleans"), ("United States", "New Orleans")),
    (("UAE Abu", "Dhabi"), ("United Arab Emirates", "Abu Dhabi")),
    (("Mexico Mexico", "City"), ("Mexico", "Mexico City")),
    (("Russia Saint", "Petersburg"), ("Russia", "Saint Petersburg")),
    (("HK Hong", "Kong"), ("Hong Kong", "Hong Kong")),
    (("Brazil Rio", "Janeiro"), ("Brazil", "Rio de Janeiro")),
    (("Brazil Sao", "Paulo"), ("Brazil", "Sao Paulo")),
    (("Vatican", "City"), ("Vatican City", "Vatican City")),
];

static CORRECTION_MAP: LazyLock<HashMap<(&'static str, &'static str), (&'static str, &'static str)>> =
    LazyLock::new(|| CORRECTIONS.iter().copied().collect());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Split a location cell into country and city.
///
/// `Country, City[, Region]` splits on the first comma and needs a non-empty
/// segment on each side. Without a comma the
/// last word is taken as the city, then the correction table repairs
/// multi-word cities. A single word is a country with no city.
pub fn split_location(cell: &str) -> Location {
    let text = cell.trim();
    let (country, city) = if text.contains(',') {
        split_on_commas(text)
    } else if text.contains(char::is_whitespace) {
        split_on_last_word(text)
    } else if text.is_empty() {
        (None, None)
    } else {
        (Some(text.to_string()), None)
    };

    match (country, city) {
        (Some(country), Some(city)) => correct(country, city),
        (country, city) => Location { country, city },
    }
}

/// A comma form needs both sides; `", Madrid"` can't say which column the
/// lone segment belongs to, so it yields neither.
fn split_on_commas(text: &str) -> (Option<String>, Option<String>) {
    let segments: Vec<&str> = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    match segments.split_first() {
        Some((country, rest)) if !rest.is_empty() => {
            (Some(country.to_string()), Some(rest.join(", ")))
        }
        _ => (None, None),
    }
}

fn split_on_last_word(text: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.split_last() {
        Some((city, country)) if !country.is_empty() => {
            (Some(country.join(" ")), Some(city.to_string()))
        }
        Some((only, _)) => (Some(only.to_string()), None),
        None => (None, None),
    }
}

fn correct(country: String, city: String) -> Location {
    match CORRECTION_MAP.get(&(country.as_str(), city.as_str())) {
        Some(&(fixed_country, fixed_city)) => Location {
            country: Some(fixed_country.to_string()),
            city: Some(fixed_city.to_string()),
        },
        None => Location {
            country: Some(country),
            city: Some(city),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(country: Option<&str>, city: Option<&str>) -> Location {
        Location {
            country: country.map(String::from),
            city: city.map(String::from),
        }
    }

    #[test]
    fn comma_split() {
        assert_eq!(split_location("France, Paris"), loc(Some("France"), Some("Paris")));
        assert_eq!(
            split_location("United States, Washington, D.C."),
            loc(Some("United States"), Some("Washington, D.C."))
        );
    }

    #[test]
    fn comma_with_empty_segments() {
        assert_eq!(split_location("Spain, "), loc(None, None));
        assert_eq!(split_location("Spain,"), loc(None, None));
        assert_eq!(split_location(", Madrid"), loc(None, None));
        assert_eq!(split_location(","), loc(None, None));
        assert_eq!(
            split_location("Spain, , Madrid"),
            loc(Some("Spain"), Some("Madrid"))
        );
    }

    #[test]
    fn whitespace_split_last_word_is_city() {
        assert_eq!(split_location("Spain Madrid"), loc(Some("Spain"), Some("Madrid")));
        assert_eq!(
            split_location("United Kingdom London"),
            loc(Some("United Kingdom"), Some("London"))
        );
    }

    #[test]
    fn corrections_apply() {
        assert_eq!(
            split_location("UAE Abu Dhabi"),
            loc(Some("United Arab Emirates"), Some("Abu Dhabi"))
        );
        assert_eq!(
            split_location("United States New York City"),
            loc(Some("United States"), Some("New York City"))
        );
        assert_eq!(
            split_location("Vatican City"),
            loc(Some("Vatican City"), Some("Vatican City"))
        );
    }

    #[test]
    fn corrections_are_exact_match() {
        assert_eq!(split_location("UAE  Abu Dhabi"), loc(Some("United Arab Emirates"), Some("Abu Dhabi")));
        assert_eq!(split_location("UAE Abu-Dhabi"), loc(Some("UAE"), Some("Abu-Dhabi")));
        assert_eq!(split_location("uae abu dhabi"), loc(Some("uae abu"), Some("dhabi")));
    }

    #[test]
    fn single_word_and_empty() {
        assert_eq!(split_location("Singapore"), loc(Some("Singapore"), None));
        assert_eq!(split_location("   "), loc(None, None));
    }
}
