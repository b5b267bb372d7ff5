//! Elo expected score as a win probability

use std::path::Path;

use crate::features::{expected_score, EloFeatures};
use crate::{ForecastError, Result};

use super::{ModelKind, WinProbabilityModel};

/// Predicts `1 / (1 + 10^((elo2 - elo1) / 400))` with no fitted parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct EloExpectedModel;

impl EloExpectedModel {
    pub fn new() -> Self {
        EloExpectedModel
    }
}

impl WinProbabilityModel for EloExpectedModel {
    fn kind(&self) -> ModelKind {
        ModelKind::EloExpected
    }

    fn fit(&mut self, features: &[EloFeatures], labels: &[bool]) -> Result<()> {
        if features.len() != labels.len() {
            return Err(ForecastError::InvalidArgument(format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            )));
        }
        Ok(())
    }

    fn predict_proba(&self, features: &[EloFeatures]) -> Result<Vec<f64>> {
        Ok(features
            .iter()
            .map(|f| expected_score(f.elo1_before, f.elo2_before))
            .collect())
    }

    fn save(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}
