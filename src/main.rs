mod cities;
mod db;
mod fetch;
mod model;
mod parser;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use db::MuseumRow;
use model::ModelArtifact;
use parser::extract::MuseumRecord;
use settings::Settings;
use parser::{ParseOutput, RawDocument};

#[derive(Parser)]
#[command(name = "museum_etl", about = "Most-visited museums table ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the wikitext and save it locally
    Fetch {
        /// Page title (default: configured title)
        #[arg(short, long)]
        title: Option<String>,
        /// Output path (default: configured raw path)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Parse saved wikitext files and print the records
    Parse {
        /// Wikitext files (default: configured raw path)
        inputs: Vec<PathBuf>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// List discarded rows
        #[arg(long)]
        show_discards: bool,
    },
    /// Fetch, parse and load into SQLite, then load city populations
    Etl {
        /// Page title (default: configured title)
        #[arg(short, long)]
        title: Option<String>,
        /// Keep a copy of the fetched wikitext
        #[arg(long)]
        save_raw: bool,
        /// Don't load the city population CSV
        #[arg(long)]
        skip_cities: bool,
    },
    /// Load the city population CSV
    Cities {
        /// CSV path (default: configured path)
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show stored museums by rank
    Top {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "25")]
        limit: usize,
    },
    /// Show database counts
    Stats,
    /// Fit log1p(visitors) against log1p(city population) and save the model
    Train {
        /// Ignore museums below this visitor count
        #[arg(long, default_value_t = model::DEFAULT_MIN_VISITORS)]
        min_visitors: u64,
        /// Artifact path (default: configured model path)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Predict visitors for a city population using the saved model
    Predict {
        population: i64,
        /// Artifact path (default: configured model path)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(?settings, "settings loaded");

    let result = match cli.command {
        Commands::Fetch { title, out } => {
            let title = title.unwrap_or_else(|| settings.title.clone());
            let doc = fetch::fetch_wikitext(&settings, &title).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&settings.raw_path));
            fetch::save_raw(&out, &doc.text)?;
            println!("Saved '{}' ({} bytes) to {}", doc.title, doc.text.len(), out.display());
            Ok(())
        }
        Commands::Parse {
            inputs,
            json,
            show_discards,
        } => {
            let inputs = if inputs.is_empty() {
                vec![PathBuf::from(&settings.raw_path)]
            } else {
                inputs
            };
            let docs = inputs
                .iter()
                .map(|p| read_document(p))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut failed = 0;
            for (path, result) in inputs.iter().zip(parser::parse_documents(&docs)) {
                match result {
                    Ok(output) if json => println!("{}", serde_json::to_string_pretty(&output)?),
                    Ok(output) => print_output(output, show_discards),
                    Err(e) => {
                        warn!(path = %path.display(), "{}", e);
                        failed += 1;
                    }
                }
            }
            if failed == docs.len() {
                bail!("No document contained a museum table");
            }
            Ok(())
        }
        Commands::Etl {
            title,
            save_raw,
            skip_cities,
        } => {
            let title = title.unwrap_or_else(|| settings.title.clone());
            let doc = fetch::fetch_wikitext(&settings, &title).await?;
            if save_raw {
                fetch::save_raw(Path::new(&settings.raw_path), &doc.text)?;
            }

            let output = parser::parse_document(&doc)
                .with_context(|| format!("Failed to parse '{}'", doc.title))?;
            if output.records.is_empty() {
                bail!("No museum records parsed from '{}'", doc.title);
            }

            let conn = db::connect(Path::new(&settings.db_path))?;
            db::init_schema(&conn)?;
            let inserted = db::insert_museum_rows(
                &conn,
                &output.records,
                &output.title,
                db::UNKNOWN_REVISION,
                chrono::Utc::now().timestamp(),
            )?;
            println!(
                "Inserted {} museum rows ({} parsed after dedup).",
                inserted,
                output.records.len()
            );
            if !output.discards.is_empty() {
                println!("Discarded {} rows during parsing.", output.discards.len());
            }

            if !skip_cities {
                let cities = cities::load_city_populations(Path::new(&settings.city_csv))?;
                let upserted = db::upsert_cities(&conn, &cities)?;
                println!("Upserted {} city population rows.", upserted);
            }
            Ok(())
        }
        Commands::Cities { csv } => {
            let path = csv.unwrap_or_else(|| PathBuf::from(&settings.city_csv));
            let cities = cities::load_city_populations(&path)?;
            let conn = db::connect(Path::new(&settings.db_path))?;
            db::init_schema(&conn)?;
            let upserted = db::upsert_cities(&conn, &cities)?;
            println!("Upserted {} city population rows.", upserted);
            Ok(())
        }
        Commands::Top { limit } => {
            let conn = db::connect(Path::new(&settings.db_path))?;
            db::init_schema(&conn)?;
            let rows = db::fetch_museums(&conn, Some(limit))?;
            for line in top_lines(&rows) {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(Path::new(&settings.db_path))?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Museums: {}", s.museums);
            println!("Pages:   {}", s.pages);
            println!("Cities:  {}", s.cities);
            println!("Linked:  {}", s.linked);
            Ok(())
        }
        Commands::Train { min_visitors, out } => {
            let conn = db::connect(Path::new(&settings.db_path))?;
            db::init_schema(&conn)?;
            let rows = db::fetch_training_rows(&conn, min_visitors)?;
            let artifact = model::train(&rows, chrono::Utc::now())
                .with_context(|| format!("Training with min visitors {}", min_visitors))?;
            let out = out.unwrap_or_else(|| PathBuf::from(&settings.model_path));
            artifact.save(&out)?;

            let m = &artifact.training_metrics;
            println!("Trained on {} rows, saved to {}", m.n_rows, out.display());
            println!(
                "coef={:.4} intercept={:.4}",
                artifact.model.coef_log[0], artifact.model.intercept_log
            );
            println!(
                "r2={} mae={:.0} rmse={:.0}",
                m.r2.map(|r| format!("{:.4}", r)).unwrap_or_else(|| "n/a".into()),
                m.mae,
                m.rmse
            );
            Ok(())
        }
        Commands::Predict { population, model } => {
            let path = model.unwrap_or_else(|| PathBuf::from(&settings.model_path));
            let artifact = ModelArtifact::load(&path)?;
            let visitors = artifact.model.predict(population)?;
            println!(
                "Predicted visitors for population {}: {:.0}",
                population, visitors
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn read_document(path: &Path) -> anyhow::Result<RawDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawDocument { title, text })
}

fn print_output(output: ParseOutput, show_discards: bool) {
    let mut records: Vec<MuseumRecord> = output.records;
    parser::dedup::sort_by_rank(&mut records);

    println!("== {} ==", output.title);
    println!(
        "{:>4} | {:<40} | {:<20} | {:<20} | {:>10}",
        "Rank", "Museum", "Country", "City", "Visitors"
    );
    println!("{}", "-".repeat(106));
    for r in &records {
        println!(
            "{:>4} | {:<40} | {:<20} | {:<20} | {:>10}",
            opt(r.rank),
            truncate(&r.name, 40),
            truncate(r.country.as_deref().unwrap_or("-"), 20),
            truncate(r.city.as_deref().unwrap_or("-"), 20),
            r.visitors,
        );
    }
    println!(
        "\n{} records, {} discarded",
        records.len(),
        output.discards.len()
    );

    if show_discards {
        for d in &output.discards {
            println!("  {}: {}", d.reason, d.cells.join(" || "));
        }
    }
}

fn top_lines(rows: &[MuseumRow]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["No museums stored. Run 'etl' first.".to_string()];
    }
    let mut lines = vec![
        format!(
            "{:>4} | {:<40} | {:<20} | {:<20} | {:>10} | {:>10}",
            "Rank", "Museum", "Country", "City", "Visitors", "Population"
        ),
        "-".repeat(119),
    ];
    lines.extend(rows.iter().map(|r| {
        format!(
            "{:>4} | {:<40} | {:<20} | {:<20} | {:>10} | {:>10}",
            opt(r.rank),
            truncate(&r.name, 40),
            truncate(r.country.as_deref().unwrap_or("-"), 20),
            truncate(r.city.as_deref().unwrap_or("-"), 20),
            opt(r.visitors),
            opt(r.population),
        )
    }));
    lines
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
