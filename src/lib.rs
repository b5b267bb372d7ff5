//! Match outcome prediction from leakage-free Elo ratings
//!
//! Ratings are replayed strictly in chronological order, every match gets the
//! ratings both sides held before it was played, and models are evaluated on a
//! time-ordered held-out suffix of the match log.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::features::elo::EloConfig;
use crate::features::EloFeatures;
use crate::model::ModelKind;

/// Team identity: trimmed, case-preserving name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(name: &str) -> Self {
        TeamId(name.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamId {
    fn from(name: &str) -> Self {
        TeamId::new(name)
    }
}

/// A single match from the log, already normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub team1: TeamId,
    pub team2: TeamId,
    /// `Some(true)` if team1 won, `Some(false)` if it did not, `None` when the
    /// match has no genuine result (upcoming, unfinished, unknown winner)
    pub team1_win: Option<bool>,
}

impl MatchRecord {
    pub fn new(team1: &str, team2: &str, team1_win: Option<bool>) -> Self {
        MatchRecord {
            match_id: None,
            date: None,
            team1: TeamId::new(team1),
            team2: TeamId::new(team2),
            team1_win,
        }
    }

    pub fn is_labeled(&self) -> bool {
        self.team1_win.is_some()
    }
}

/// Model output for one match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub match_id: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub team1: TeamId,
    pub team2: TeamId,
    pub features: EloFeatures,
    pub p_team1_win: f64,
    pub team1_win: Option<bool>,
}

impl Prediction {
    /// Discrete prediction at the given threshold
    pub fn predicted_team1_win(&self, threshold: f64) -> bool {
        self.p_team1_win >= threshold
    }

    /// Whether the discrete prediction matched the outcome, if known
    pub fn is_correct(&self, threshold: f64) -> Option<bool> {
        self.team1_win
            .map(|actual| actual == self.predicted_team1_win(threshold))
    }

    pub fn favourite(&self) -> &TeamId {
        if self.p_team1_win >= 0.5 {
            &self.team1
        } else {
            &self.team2
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Too few matches to train a model: have {available}, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("Test set is empty - at least one row is required")]
    EmptyTestSet,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub elo: EloConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of the most recent matches held out for testing
    pub test_fraction: f64,
    /// Force the test suffix to contain at least this many recent rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_row_override: Option<usize>,
    /// Fewer usable matches than this aborts training
    pub min_matches: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            test_fraction: 0.2,
            trailing_row_override: None,
            min_matches: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub decision_threshold: f64,
    pub calibration_bins: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            decision_threshold: 0.5,
            calibration_bins: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Epochs without loss improvement before fitting stops early
    pub patience: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            kind: ModelKind::Logistic,
            learning_rate: 0.1,
            epochs: 500,
            patience: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub csv_path: String,
    pub model_path: String,
    pub artifacts_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            csv_path: "data/matches.csv".to_string(),
            model_path: "artifacts/model".to_string(),
            artifacts_dir: "artifacts".to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ForecastError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ForecastError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values outside their meaningful range
    pub fn validate(&self) -> Result<()> {
        if !self.elo.base_rating.is_finite() {
            return Err(ForecastError::Config("elo.base_rating must be finite".to_string()));
        }
        if !(self.elo.k_factor.is_finite() && self.elo.k_factor >= 0.0) {
            return Err(ForecastError::Config(
                "elo.k_factor must be a non-negative number".to_string(),
            ));
        }
        if !(self.split.test_fraction > 0.0 && self.split.test_fraction < 1.0) {
            return Err(ForecastError::Config(format!(
                "split.test_fraction must be in (0, 1), got {}",
                self.split.test_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.evaluation.decision_threshold) {
            return Err(ForecastError::Config(format!(
                "evaluation.decision_threshold must be in [0, 1], got {}",
                self.evaluation.decision_threshold
            )));
        }
        if self.evaluation.calibration_bins == 0 {
            return Err(ForecastError::Config(
                "evaluation.calibration_bins must be at least 1".to_string(),
            ));
        }
        if !(self.model.learning_rate.is_finite() && self.model.learning_rate > 0.0) {
            return Err(ForecastError::Config(
                "model.learning_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
