pub mod location;
pub mod name;
pub mod rank;
pub mod visitors;

use std::fmt;

use serde::Serialize;

use location::split_location;
use name::clean_museum_name;
use rank::parse_rank;
use visitors::parse_visitors;

/// Rows need rank, name, location and visitors.
pub const MIN_CELLS: usize = 4;
pub const MIN_VISITORS: u64 = 100_000;

/// A parsed row before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub rank: Option<u32>,
    pub name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub visitors: Option<u64>,
    pub raw_visitors: String,
}

/// A row that passed validation: non-empty name, at least `MIN_VISITORS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuseumRecord {
    pub rank: Option<u32>,
    pub name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub visitors: u64,
    pub raw_visitors: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    TooFewCells,
    FailedValidation,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::TooFewCells => f.write_str("too_few_cells"),
            DiscardReason::FailedValidation => f.write_str("failed_validation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardRecord {
    pub reason: DiscardReason,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted(MuseumRecord),
    Discarded(DiscardRecord),
}

/// Turn one row of cleaned cells into an accepted record or a discard.
pub fn assemble_row(cells: Vec<String>) -> RowOutcome {
    if cells.len() < MIN_CELLS {
        return RowOutcome::Discarded(DiscardRecord {
            reason: DiscardReason::TooFewCells,
            cells,
        });
    }

    match validate(build_candidate(&cells)) {
        Some(record) => RowOutcome::Accepted(record),
        None => RowOutcome::Discarded(DiscardRecord {
            reason: DiscardReason::FailedValidation,
            cells,
        }),
    }
}

/// Build a candidate from the first four cells; extra cells are ignored.
pub fn build_candidate(cells: &[String]) -> CandidateRecord {
    let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
    let location = split_location(cell(2));
    let visitors = parse_visitors(cell(3));

    CandidateRecord {
        rank: parse_rank(cell(0)),
        name: clean_museum_name(cell(1)),
        country: location.country,
        city: location.city,
        visitors: visitors.count,
        raw_visitors: visitors.raw,
    }
}

pub fn validate(candidate: CandidateRecord) -> Option<MuseumRecord> {
    if candidate.name.is_empty() {
        return None;
    }
    let visitors = candidate.visitors.filter(|&v| v >= MIN_VISITORS)?;
    Some(MuseumRecord {
        rank: candidate.rank,
        name: candidate.name,
        country: candidate.country,
        city: candidate.city,
        visitors,
        raw_visitors: candidate.raw_visitors,
    })
}
