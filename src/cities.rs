use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

pub const SOURCE_TAG: &str = "UNSD-local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityPopulation {
    pub country: String,
    pub city: String,
    pub population: i64,
    pub year: i32,
    pub source: String,
}

/// One line of the UNSD city population export. Column names vary between
/// exports, hence the aliases.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Country or Area", alias = "Country", default)]
    country: Option<String>,
    #[serde(rename = "City", default)]
    city: Option<String>,
    #[serde(rename = "Year", default)]
    year: Option<String>,
    #[serde(rename = "Value", alias = "Population", default)]
    population: Option<String>,
}

pub fn load_city_populations(path: &Path) -> Result<Vec<CityPopulation>> {
    if !path.exists() {
        bail!(
            "City population CSV missing at {}. Download the UNSD export first.",
            path.display()
        );
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let cities = read_city_populations(file)?;
    info!(path = %path.display(), cities = cities.len(), "loaded city populations");
    Ok(cities)
}

/// Keep the latest year per `(country, city)`; incomplete or non-numeric
/// rows are skipped.
pub fn read_city_populations<R: Read>(reader: R) -> Result<Vec<CityPopulation>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut latest: BTreeMap<(String, String), CityPopulation> = BTreeMap::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize::<CsvRow>() {
        let Some(row) = result.ok().and_then(to_population) else {
            skipped += 1;
            continue;
        };
        let key = (row.country.clone(), row.city.clone());
        match latest.get(&key) {
            Some(current) if current.year >= row.year => {}
            _ => {
                latest.insert(key, row);
            }
        }
    }

    debug!(kept = latest.len(), skipped, "parsed city population rows");
    Ok(latest.into_values().collect())
}

fn to_population(row: CsvRow) -> Option<CityPopulation> {
    let country = non_empty(row.country)?;
    let city = non_empty(row.city)?;
    let year = row.year?.trim().parse().ok()?;
    let population = row.population?.trim().parse().ok()?;
    Some(CityPopulation {
        country,
        city,
        population,
        year,
        source: SOURCE_TAG.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
