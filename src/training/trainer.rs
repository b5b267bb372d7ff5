//! End-to-end training on a labeled match log
//!
//! Elo features for the whole log → time-ordered split → fit on the prefix →
//! predict and evaluate the suffix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::FeatureTable;
use crate::features::{EloFeatures, EloRatings};
use crate::model::{build_model, WinProbabilityModel};
use crate::training::metrics::{EvaluationReport, Evaluator};
use crate::training::split::TemporalSplit;
use crate::{Config, ForecastError, MatchRecord, Prediction, Result};

/// Run summary written next to the metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainInfo {
    pub timestamp: DateTime<Utc>,
    pub n_total: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub elo_k: f64,
    pub elo_base: f64,
    pub features: Vec<String>,
    pub model_type: String,
    pub epochs_run: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
}

/// Everything a training run produces
pub struct TrainOutcome {
    pub model: Box<dyn WinProbabilityModel>,
    pub report: EvaluationReport,
    pub info: TrainInfo,
    pub split: TemporalSplit,
    /// Predictions for the test suffix, in log order
    pub test_predictions: Vec<Prediction>,
    /// Ratings after replaying the whole log
    pub final_ratings: EloRatings,
}

/// Trainer for a win probability model
pub struct Trainer {
    config: Config,
}

impl Trainer {
    pub fn new(config: Config) -> Self {
        Trainer { config }
    }

    /// Train on an ordered, fully labeled log and evaluate on its recent suffix
    pub fn run(&self, records: &[MatchRecord]) -> Result<TrainOutcome> {
        let model = build_model(&self.config.model);
        self.run_with_model(records, model)
    }

    /// Same as [`Trainer::run`] with a caller-supplied classifier
    pub fn run_with_model(
        &self,
        records: &[MatchRecord],
        mut model: Box<dyn WinProbabilityModel>,
    ) -> Result<TrainOutcome> {
        self.config.validate()?;

        let required = self.config.split.min_matches;
        if records.len() < required {
            return Err(ForecastError::InsufficientData {
                available: records.len(),
                required,
            });
        }

        let (final_ratings, table) = FeatureTable::build(records, self.config.elo);
        let labels = table.labels()?;
        log::info!(
            "Built Elo features for {} matches ({} teams rated)",
            table.len(),
            final_ratings.team_count()
        );

        let split = TemporalSplit::from_config(table.len(), &self.config.split)?;
        log::info!(
            "Time split: train={} (rows 0..{}), test={} (rows {}..{})",
            split.n_train(),
            split.start,
            split.n_test(),
            split.start,
            split.total
        );
        if split.n_train() == 0 {
            return Err(ForecastError::InsufficientData {
                available: 0,
                required: 1,
            });
        }

        let features = table.features();
        let (train_x, test_x) = split.apply(&features)?;
        let (train_y, test_y) = split.apply(&labels)?;

        model.fit(train_x, train_y)?;
        let probs = model.predict_proba(test_x)?;

        let evaluator = Evaluator::from_config(&self.config.evaluation);
        let report = evaluator.evaluate(&probs, test_y)?;
        log::info!("Test metrics: {}", report);

        let test_predictions = table.rows()[split.test_range()]
            .iter()
            .zip(&probs)
            .map(|(row, &p)| Prediction {
                match_id: row.match_id.clone(),
                date: row.date,
                team1: row.team1.clone(),
                team2: row.team2.clone(),
                features: row.features,
                p_team1_win: p,
                team1_win: row.label,
            })
            .collect();

        let info = TrainInfo {
            timestamp: Utc::now(),
            n_total: table.len(),
            n_train: split.n_train(),
            n_test: split.n_test(),
            elo_k: self.config.elo.k_factor,
            elo_base: self.config.elo.base_rating,
            features: EloFeatures::NAMES.iter().map(|s| s.to_string()).collect(),
            model_type: model.kind().to_string(),
            epochs_run: model.training_history().map(|h| h.epochs()),
            csv_path: None,
        };

        Ok(TrainOutcome {
            model,
            report,
            info,
            split,
            test_predictions,
            final_ratings,
        })
    }
}
