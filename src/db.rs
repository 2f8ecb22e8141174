use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::cities::CityPopulation;
use crate::model::TrainingRow;
use crate::parser::extract::MuseumRecord;

/// Revision number stored when the fetch layer can't tell which revision it got.
pub const UNKNOWN_REVISION: i64 = -1;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS city (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            country     TEXT NOT NULL,
            city        TEXT NOT NULL,
            population  INTEGER,
            year        INTEGER,
            source      TEXT NOT NULL,
            UNIQUE(country, city)
        );
        CREATE INDEX IF NOT EXISTS idx_city_name ON city(country, city);

        CREATE TABLE IF NOT EXISTS museum_visitors (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            rank_2024        INTEGER,
            museum_name      TEXT NOT NULL,
            country          TEXT,
            city             TEXT,
            visitors_2024    INTEGER,
            raw_visitors_str TEXT,
            page_title       TEXT,
            page_revision    INTEGER,
            extracted_at_utc INTEGER,
            city_id          INTEGER REFERENCES city(id),
            UNIQUE(museum_name, city, page_revision) ON CONFLICT IGNORE
        );
        CREATE INDEX IF NOT EXISTS idx_museum_city ON museum_visitors(museum_name, city);
        CREATE INDEX IF NOT EXISTS idx_rank ON museum_visitors(rank_2024);
        ",
    )?;
    ensure_city_id_column(conn)?;
    Ok(())
}

/// Databases created before city linking lack `city_id`.
fn ensure_city_id_column(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(museum_visitors)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    if !columns.iter().any(|c| c == "city_id") {
        conn.execute(
            "ALTER TABLE museum_visitors ADD COLUMN city_id INTEGER REFERENCES city(id)",
            [],
        )?;
    }
    Ok(())
}

// ── Museums ──

/// Insert parsed records; duplicates of `(name, city, revision)` are ignored.
/// Returns the number of rows actually written.
pub fn insert_museum_rows(
    conn: &Connection,
    records: &[MuseumRecord],
    page_title: &str,
    page_revision: i64,
    extracted_at_utc: i64,
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO museum_visitors
             (rank_2024, museum_name, country, city, visitors_2024, raw_visitors_str,
              page_title, page_revision, extracted_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for r in records {
            count += stmt.execute(rusqlite::params![
                r.rank,
                r.name,
                r.country,
                r.city,
                r.visitors as i64,
                r.raw_visitors,
                page_title,
                page_revision,
                extracted_at_utc,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct MuseumRow {
    pub rank: Option<u32>,
    pub name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub visitors: Option<i64>,
    pub population: Option<i64>,
}

/// Persisted museums by rank (unranked last), with the linked city population.
pub fn fetch_museums(conn: &Connection, limit: Option<usize>) -> Result<Vec<MuseumRow>> {
    let limit = limit.map(|n| n as i64).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT m.rank_2024, m.museum_name, m.country, m.city, m.visitors_2024, c.population
         FROM museum_visitors m
         LEFT JOIN city c ON c.id = m.city_id
         ORDER BY m.rank_2024 IS NULL, m.rank_2024, m.museum_name
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(MuseumRow {
                rank: row.get(0)?,
                name: row.get(1)?,
                country: row.get(2)?,
                city: row.get(3)?,
                visitors: row.get(4)?,
                population: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Museums with at least `min_visitors` visitors whose `(country, city)`
/// matches a city row with a known population. Matching ignores case and
/// surrounding whitespace, unlike the exact `city_id` link.
pub fn fetch_training_rows(conn: &Connection, min_visitors: u64) -> Result<Vec<TrainingRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.museum_name, m.country, m.city, m.visitors_2024, c.population
         FROM museum_visitors m
         JOIN city c
           ON lower(trim(m.country)) = lower(trim(c.country))
          AND lower(trim(m.city)) = lower(trim(c.city))
         WHERE m.visitors_2024 IS NOT NULL AND m.visitors_2024 >= ?1
           AND c.population IS NOT NULL AND c.population > 0
         ORDER BY m.rank_2024 IS NULL, m.rank_2024, m.museum_name",
    )?;
    let rows = stmt
        .query_map([min_visitors as i64], |row| {
            Ok(TrainingRow {
                museum_name: row.get(0)?,
                country: row.get(1)?,
                city: row.get(2)?,
                visitors: row.get::<_, i64>(3)? as f64,
                population: row.get::<_, i64>(4)? as f64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Cities ──

/// Upsert city populations, then relink museums to cities on exact
/// `(country, city)`. Returns the number of city rows processed.
pub fn upsert_cities(conn: &Connection, cities: &[CityPopulation]) -> Result<usize> {
    if cities.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO city (country, city, population, year, source)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(country, city) DO UPDATE SET
                 population = excluded.population,
                 year = excluded.year,
                 source = excluded.source",
        )?;
        for c in cities {
            stmt.execute(rusqlite::params![c.country, c.city, c.population, c.year, c.source])?;
        }
        tx.execute(
            "UPDATE museum_visitors
             SET city_id = (
                 SELECT id FROM city
                 WHERE city.country = museum_visitors.country
                   AND city.city = museum_visitors.city
             )
             WHERE country IS NOT NULL AND city IS NOT NULL",
            [],
        )?;
    }
    tx.commit()?;
    Ok(cities.len())
}

// ── Stats ──

pub struct Stats {
    pub museums: i64,
    pub pages: i64,
    pub cities: i64,
    pub linked: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
    Ok(Stats {
        museums: count("SELECT COUNT(*) FROM museum_visitors")?,
        pages: count("SELECT COUNT(DISTINCT page_title) FROM museum_visitors")?,
        cities: count("SELECT COUNT(*) FROM city")?,
        linked: count("SELECT COUNT(*) FROM museum_visitors WHERE city_id IS NOT NULL")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(rank: Option<u32>, name: &str, country: &str, city: Option<&str>) -> MuseumRecord {
        MuseumRecord {
            rank,
            name: name.to_string(),
            country: Some(country.to_string()),
            city: city.map(String::from),
            visitors: 1_000_000,
            raw_visitors: "1,000,000".to_string(),
        }
    }

    fn city(country: &str, name: &str, population: i64) -> CityPopulation {
        CityPopulation {
            country: country.to_string(),
            city: name.to_string(),
            population,
            year: 2020,
            source: "UNSD-local".to_string(),
        }
    }

    #[test]
    fn insert_ignores_same_revision_duplicates() {
        let conn = memory();
        let records = vec![
            record(Some(1), "Louvre", "France", Some("Paris")),
            record(Some(3), "British Museum", "United Kingdom", Some("London")),
        ];
        assert_eq!(insert_museum_rows(&conn, &records, "T", 42, 0).unwrap(), 2);
        assert_eq!(insert_museum_rows(&conn, &records, "T", 42, 1).unwrap(), 0);
        assert_eq!(insert_museum_rows(&conn, &records, "T", 43, 1).unwrap(), 2);
        assert_eq!(get_stats(&conn).unwrap().museums, 4);
    }

    #[test]
    fn fetch_orders_by_rank_unranked_last() {
        let conn = memory();
        let records = vec![
            record(None, "Rijksmuseum", "Netherlands", Some("Amsterdam")),
            record(Some(3), "British Museum", "United Kingdom", Some("London")),
            record(Some(1), "Louvre", "France", Some("Paris")),
        ];
        insert_museum_rows(&conn, &records, "T", UNKNOWN_REVISION, 0).unwrap();

        let rows = fetch_museums(&conn, None).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Louvre", "British Museum", "Rijksmuseum"]);

        assert_eq!(fetch_museums(&conn, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn upsert_links_and_updates() {
        let conn = memory();
        let records = vec![
            record(Some(1), "Louvre", "France", Some("Paris")),
            record(Some(2), "Vatican Museums", "Vatican City", None),
        ];
        insert_museum_rows(&conn, &records, "T", UNKNOWN_REVISION, 0).unwrap();

        assert_eq!(upsert_cities(&conn, &[city("France", "Paris", 2_100_000)]).unwrap(), 1);
        assert_eq!(upsert_cities(&conn, &[city("France", "Paris", 2_165_423)]).unwrap(), 1);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.cities, 1);
        assert_eq!(stats.linked, 1);
        assert_eq!(stats.pages, 1);

        let rows = fetch_museums(&conn, None).unwrap();
        assert_eq!(rows[0].population, Some(2_165_423));
        assert_eq!(rows[1].population, None);
    }

    #[test]
    fn schema_is_reentrant() {
        let conn = memory();
        init_schema(&conn).unwrap();
        assert_eq!(upsert_cities(&conn, &[]).unwrap(), 0);
    }

    #[test]
    fn training_rows_match_loosely_and_filter_small() {
        let conn = memory();
        let records = vec![
            record(Some(1), "Louvre", "France", Some("Paris")),
            record(Some(2), "Prado", " spain ", Some("MADRID")),
            MuseumRecord {
                visitors: 300_000,
                ..record(Some(3), "Small", "France", Some("Paris"))
            },
            record(Some(4), "Nowhere", "France", Some("Lyon")),
        ];
        insert_museum_rows(&conn, &records, "T", UNKNOWN_REVISION, 0).unwrap();
        upsert_cities(
            &conn,
            &[city("France", "Paris", 2_100_000), city("Spain", "Madrid", 3_300_000)],
        )
        .unwrap();

        let rows = fetch_training_rows(&conn, 500_000).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.museum_name.as_str()).collect();
        assert_eq!(names, vec!["Louvre", "Prado"]);
        assert_eq!(rows[1].population, 3_300_000.0);
        assert_eq!(rows[0].visitors, 1_000_000.0);

        assert_eq!(fetch_training_rows(&conn, 0).unwrap().len(), 3);
    }
}
