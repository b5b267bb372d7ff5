//! Win probability models
//!
//! Any binary classifier that can be fitted on the training prefix and return
//! P(team1 wins) for feature rows:
//! - Logistic: z-scored Elo features into a single linear unit (burn)
//! - EloExpected: the Elo expected score itself, no fitting

pub mod elo_baseline;
pub mod logistic;

pub use elo_baseline::EloExpectedModel;
pub use logistic::{FeatureScaler, LogisticConfig, LogisticModel};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::features::{EloConfig, EloFeatures};
use crate::training::metrics::TrainingHistory;
use crate::{ForecastError, ModelConfig, Result};

/// Metadata written next to a saved model
pub const META_FILE: &str = "meta.json";

/// Which classifier to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Logistic,
    EloExpected,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Logistic => write!(f, "LogisticRegression"),
            ModelKind::EloExpected => write!(f, "EloExpected"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" | "lr" => Ok(ModelKind::Logistic),
            "elo-expected" | "elo" => Ok(ModelKind::EloExpected),
            _ => Err(format!("Unknown model: {}. Use logistic or elo-expected.", s)),
        }
    }
}

/// A binary probabilistic classifier over Elo features
pub trait WinProbabilityModel {
    fn kind(&self) -> ModelKind;

    /// Fit on the training prefix only
    fn fit(&mut self, features: &[EloFeatures], labels: &[bool]) -> Result<()>;

    /// P(team1 wins) for each row, in order
    fn predict_proba(&self, features: &[EloFeatures]) -> Result<Vec<f64>>;

    /// Write model-specific files into `dir`
    fn save(&self, dir: &Path) -> Result<()>;

    /// Loss history of the last fit, if the model is trained iteratively
    fn training_history(&self) -> Option<&TrainingHistory> {
        None
    }
}

/// Saved model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub kind: ModelKind,
    pub feature_names: Vec<String>,
    /// Elo parameters the features were built with
    pub elo: EloConfig,
}

/// Create an unfitted model for the configured kind
pub fn build_model(config: &ModelConfig) -> Box<dyn WinProbabilityModel> {
    match config.kind {
        ModelKind::Logistic => Box::new(LogisticModel::new(LogisticConfig::from(config))),
        ModelKind::EloExpected => Box::new(EloExpectedModel::new()),
    }
}

/// Save a fitted model and its metadata into `dir`
pub fn save_model(model: &dyn WinProbabilityModel, dir: &Path, elo: &EloConfig) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    model.save(dir)?;

    let meta = ModelMeta {
        kind: model.kind(),
        feature_names: EloFeatures::NAMES.iter().map(|s| s.to_string()).collect(),
        elo: *elo,
    };
    std::fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
    log::info!("Saved {} model to {}", meta.kind, dir.display());
    Ok(())
}

/// Load a model saved with [`save_model`]
pub fn load_model(dir: &Path, config: &ModelConfig) -> Result<(Box<dyn WinProbabilityModel>, ModelMeta)> {
    let meta_path = dir.join(META_FILE);
    let content = std::fs::read_to_string(&meta_path).map_err(|e| {
        ForecastError::Model(format!(
            "No trained model at {} ({}) - run `elo-forecast train` first",
            dir.display(),
            e
        ))
    })?;
    let meta: ModelMeta = serde_json::from_str(&content)?;

    let expected: Vec<String> = EloFeatures::NAMES.iter().map(|s| s.to_string()).collect();
    if meta.feature_names != expected {
        return Err(ForecastError::Model(format!(
            "Model expects features {:?}, this build produces {:?}",
            meta.feature_names, expected
        )));
    }

    let model: Box<dyn WinProbabilityModel> = match meta.kind {
        ModelKind::Logistic => Box::new(LogisticModel::load(dir, LogisticConfig::from(config))?),
        ModelKind::EloExpected => Box::new(EloExpectedModel::new()),
    };
    Ok((model, meta))
}
