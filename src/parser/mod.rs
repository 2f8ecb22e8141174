pub mod clean;
pub mod dedup;
pub mod extract;
pub mod rows;
pub mod table;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use extract::{DiscardRecord, MuseumRecord, RowOutcome};

/// Fetched markup plus the title it resolved to.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOutput {
    pub title: String,
    pub records: Vec<MuseumRecord>,
    pub discards: Vec<DiscardRecord>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no 'wikitable sortable' table found in document")]
    TableNotFound,
}

/// markup → table → rows → cells → records → deduplicated records.
///
/// Only a missing table fails; bad rows end up in `discards`.
pub fn parse_document(doc: &RawDocument) -> Result<ParseOutput, ParseError> {
    let table = table::locate_table(&doc.text)?;

    let mut accepted = Vec::new();
    let mut discards = Vec::new();
    let rows = rows::segment_rows(table);
    for row in &rows {
        let cells: Vec<String> = rows::split_cells(row)
            .iter()
            .map(|c| clean::clean_cell(c))
            .collect();
        match extract::assemble_row(cells) {
            RowOutcome::Accepted(record) => accepted.push(record),
            RowOutcome::Discarded(discard) => {
                debug!(reason = %discard.reason, cells = ?discard.cells, "row discarded");
                discards.push(discard);
            }
        }
    }

    let accepted_count = accepted.len();
    let records = dedup::dedup_records(accepted);
    debug!(
        title = %doc.title,
        rows = rows.len(),
        accepted = accepted_count,
        kept = records.len(),
        discarded = discards.len(),
        "parsed document"
    );

    Ok(ParseOutput {
        title: doc.title.clone(),
        records,
        discards,
    })
}

/// Parse independent documents in parallel; results keep input order.
pub fn parse_documents(docs: &[RawDocument]) -> Vec<Result<ParseOutput, ParseError>> {
    docs.par_iter().map(parse_document).collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use super::extract::DiscardReason;

    fn fixture() -> RawDocument {
        RawDocument {
            title: "List_of_most_visited_art_museums".to_string(),
            text: std::fs::read_to_string("tests/fixtures/museums.wiki").unwrap(),
        }
    }

    fn find<'a>(out: &'a ParseOutput, name: &str) -> &'a MuseumRecord {
        out.records
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("{} missing from {:?}", name, out.records))
    }

    #[test]
    fn fixture_records() {
        let out = parse_document(&fixture()).unwrap();
        let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Louvre",
                "Vatican Museums",
                "British Museum",
                "Metropolitan Museum of Art",
                "Musée d'Orsay",
                "Tate Modern",
                "National Museum of Korea",
                "Louvre Abu Dhabi",
                "Rijksmuseum",
            ]
        );
        assert!(!names.contains(&"Not Counted"));
    }

    #[test]
    fn fixture_fields() {
        let out = parse_document(&fixture()).unwrap();

        let louvre = find(&out, "Louvre");
        assert_eq!(louvre.rank, Some(1));
        assert_eq!(louvre.visitors, 8_700_000);
        assert_eq!(louvre.raw_visitors, "8,700,000 (2024)");

        let met = find(&out, "Metropolitan Museum of Art");
        assert_eq!(met.country.as_deref(), Some("United States"));
        assert_eq!(met.city.as_deref(), Some("New York City"));

        let orsay = find(&out, "Musée d'Orsay");
        assert_eq!(orsay.rank, Some(5));

        let korea = find(&out, "National Museum of Korea");
        assert_eq!(korea.visitors, 4_180_000);
        assert_eq!(korea.raw_visitors, "4,180,000 (estimate)");

        let abu_dhabi = find(&out, "Louvre Abu Dhabi");
        assert_eq!(abu_dhabi.country.as_deref(), Some("United Arab Emirates"));
        assert_eq!(abu_dhabi.city.as_deref(), Some("Abu Dhabi"));

        let tate = find(&out, "Tate Modern");
        assert_eq!(tate.city.as_deref(), Some("London"));

        assert_eq!(find(&out, "Rijksmuseum").rank, None);
    }

    #[test]
    fn fixture_dedup_keeps_best_rank() {
        let out = parse_document(&fixture()).unwrap();
        let louvres: Vec<_> = out
            .records
            .iter()
            .filter(|r| r.name == "Louvre" && r.city.as_deref() == Some("Paris"))
            .collect();
        assert_eq!(louvres.len(), 1);
        assert_eq!(louvres[0].rank, Some(1));
        assert_eq!(find(&out, "British Museum").rank, Some(3));
    }

    #[test]
    fn fixture_discards() {
        let out = parse_document(&fixture()).unwrap();
        let reasons: Vec<DiscardReason> = out.discards.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DiscardReason::TooFewCells,
                DiscardReason::FailedValidation,
                DiscardReason::FailedValidation,
            ]
        );
        assert_eq!(out.discards[0].cells, vec!["11", "Museo Sorolla", "Spain, Madrid"]);
    }

    #[test]
    fn accepted_records_meet_threshold() {
        let out = parse_document(&fixture()).unwrap();
        assert!(out
            .records
            .iter()
            .all(|r| !r.name.is_empty() && r.visitors >= extract::MIN_VISITORS));
    }

    #[test]
    fn no_table_no_records() {
        let doc = RawDocument {
            title: "Empty".to_string(),
            text: "Just prose with a {| class=\"wikitable\"\n| x\n|} table.".to_string(),
        };
        assert_eq!(parse_document(&doc).unwrap_err(), ParseError::TableNotFound);
    }

    #[test]
    fn batch_keeps_order() {
        let docs = vec![
            fixture(),
            RawDocument {
                title: "Missing".to_string(),
                text: String::new(),
            },
            fixture(),
        ];
        let results = parse_documents(&docs);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err(), &ParseError::TableNotFound);
        assert_eq!(results[2].as_ref().unwrap().records.len(), 9);
    }
}
