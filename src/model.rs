use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_MIN_VISITORS: u64 = 500_000;
pub const FEATURE: &str = "log1p(population)";
pub const TARGET: &str = "log1p(visitors)";
const PREVIEW_ROWS: usize = 5;

/// A museum joined with the population of its city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub museum_name: String,
    pub country: String,
    pub city: String,
    pub visitors: f64,
    pub population: f64,
}

/// `log1p(visitors) = intercept_log + coef_log[0] * log1p(population)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLinearModel {
    pub coef_log: Vec<f64>,
    pub intercept_log: f64,
}

/// Fit quality on the original visitor scale. `r2` is absent when every
/// training row has the same visitor count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub r2: Option<f64>,
    pub mae: f64,
    pub rmse: f64,
    pub n_rows: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub created_utc: String,
    pub model: LogLinearModel,
    pub training_metrics: Metrics,
    pub training_sample_preview: Vec<TrainingRow>,
    pub feature: String,
    pub target: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("no training data available; run the ETL so museums link to city populations")]
    NoTrainingData,
    #[error("population must be positive, got {0}")]
    NonPositivePopulation(i64),
    #[error("model coefficients missing from artifact")]
    MissingCoefficients,
}

impl LogLinearModel {
    /// Ordinary least squares on the log1p-transformed columns. A constant
    /// feature gets a zero slope and the mean target as intercept.
    pub fn fit(rows: &[TrainingRow]) -> Result<(Self, Metrics), ModelError> {
        if rows.is_empty() {
            return Err(ModelError::NoTrainingData);
        }
        let n = rows.len() as f64;
        let xs: Vec<f64> = rows.iter().map(|r| r.population.ln_1p()).collect();
        let ys: Vec<f64> = rows.iter().map(|r| r.visitors.ln_1p()).collect();
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let (sxx, sxy) = xs.iter().zip(&ys).fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
            (sxx + (x - mean_x).powi(2), sxy + (x - mean_x) * (y - mean_y))
        });
        let coef = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let model = LogLinearModel {
            coef_log: vec![coef],
            intercept_log: mean_y - coef * mean_x,
        };

        let metrics = model.evaluate(rows);
        Ok((model, metrics))
    }

    fn evaluate(&self, rows: &[TrainingRow]) -> Metrics {
        let n = rows.len() as f64;
        let residuals: Vec<f64> = rows
            .iter()
            .map(|r| r.visitors - self.predict_raw(r.population))
            .collect();
        let mean_visitors = rows.iter().map(|r| r.visitors).sum::<f64>() / n;

        let ss_res: f64 = residuals.iter().map(|e| e * e).sum();
        let ss_tot: f64 = rows.iter().map(|r| (r.visitors - mean_visitors).powi(2)).sum();

        Metrics {
            r2: (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot),
            mae: residuals.iter().map(|e| e.abs()).sum::<f64>() / n,
            rmse: (ss_res / n).sqrt(),
            n_rows: n,
        }
    }

    pub fn predict(&self, population: i64) -> Result<f64, ModelError> {
        if population <= 0 {
            return Err(ModelError::NonPositivePopulation(population));
        }
        if self.coef_log.is_empty() {
            return Err(ModelError::MissingCoefficients);
        }
        Ok(self.predict_raw(population as f64))
    }

    fn predict_raw(&self, population: f64) -> f64 {
        let coef = self.coef_log.first().copied().unwrap_or(0.0);
        (self.intercept_log + coef * population.ln_1p()).exp_m1()
    }
}

impl ModelArtifact {
    pub fn new(
        model: LogLinearModel,
        metrics: Metrics,
        rows: &[TrainingRow],
        created: DateTime<Utc>,
    ) -> Self {
        ModelArtifact {
            created_utc: created.to_rfc3339_opts(SecondsFormat::Secs, false),
            model,
            training_metrics: metrics,
            training_sample_preview: rows.iter().take(PREVIEW_ROWS).cloned().collect(),
            feature: FEATURE.to_string(),
            target: TARGET.to_string(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "saved model artifact");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| {
            format!("Model artifact missing at {}. Run 'train' first.", path.display())
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Fit on the given rows and package the result with a preview.
pub fn train(rows: &[TrainingRow], created: DateTime<Utc>) -> Result<ModelArtifact, ModelError> {
    let (model, metrics) = LogLinearModel::fit(rows)?;
    info!(
        rows = rows.len(),
        coef = model.coef_log[0],
        intercept = model.intercept_log,
        "trained visitors/population model"
    );
    Ok(ModelArtifact::new(model, metrics, rows, created))
}
