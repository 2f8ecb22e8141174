use anyhow::Result;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "MUSEUMS";

/// Runtime settings. Defaults can be overridden with `MUSEUMS_*` variables,
/// e.g. `MUSEUMS_DB_PATH=/tmp/m.sqlite`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub title: String,
    pub user_agent: String,
    pub city_csv: String,
    pub raw_path: String,
    pub model_path: String,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = defaults()?
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("db_path", "data/museums.sqlite")?
        .set_default("title", "List_of_most_visited_art_museums")?
        .set_default(
            "user_agent",
            concat!("museum-etl/", env!("CARGO_PKG_VERSION"), " (museum ingestion bot)"),
        )?
        .set_default("city_csv", "data/unsd-citypopulation-year-both.csv")?
        .set_default("raw_path", "data/raw_wikitext.txt")?
        .set_default("model_path", "models/visitors_population_linreg.json")?
        .set_default("timeout_secs", 30_i64)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let s: Settings = defaults().unwrap().build().unwrap().try_deserialize().unwrap();
        assert_eq!(s.db_path, "data/museums.sqlite");
        assert_eq!(s.title, "List_of_most_visited_art_museums");
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.model_path, "models/visitors_population_linreg.json");
        assert!(s.user_agent.starts_with("museum-etl/"));
    }

    #[test]
    fn overrides_take_precedence() {
        let s: Settings = defaults()
            .unwrap()
            .set_override("db_path", "/tmp/other.sqlite")
            .unwrap()
            .set_override("timeout_secs", "5")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(s.db_path, "/tmp/other.sqlite");
        assert_eq!(s.timeout_secs, 5);
    }
}
