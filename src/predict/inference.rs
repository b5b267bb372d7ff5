//! Model inference for predictions

use std::path::Path;

use crate::data::FeatureTable;
use crate::features::{EloConfig, EloFeatures, EloRatings};
use crate::model::{load_model, ModelKind, ModelMeta, WinProbabilityModel};
use crate::training::split::TemporalSplit;
use crate::{ForecastError, MatchRecord, ModelConfig, Prediction, Result, SplitConfig};

/// Predictor for making match predictions
pub struct Predictor {
    model: Box<dyn WinProbabilityModel>,
    elo: EloConfig,
}

impl Predictor {
    /// Wrap a fitted model; `elo` must match the parameters it was trained with
    pub fn new(model: Box<dyn WinProbabilityModel>, elo: EloConfig) -> Self {
        Predictor { model, elo }
    }

    /// Load predictor from a saved model directory
    pub fn load(dir: &Path, config: &ModelConfig) -> Result<Self> {
        let (model, meta): (_, ModelMeta) = load_model(dir, config)?;
        log::info!(
            "Loaded {} model (Elo base={}, K={})",
            meta.kind,
            meta.elo.base_rating,
            meta.elo.k_factor
        );
        Ok(Self::new(model, meta.elo))
    }

    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// Predict every match of an ordered log
    ///
    /// Ratings advance only on matches with a genuine outcome, so upcoming
    /// fixtures are scored from the ratings their predecessors produced.
    /// Returns the final rating state alongside.
    pub fn predict_log(&self, records: &[MatchRecord]) -> Result<(EloRatings, Vec<Prediction>)> {
        let (ratings, table) = FeatureTable::build(records, self.elo);
        let probs = self.model.predict_proba(&table.features())?;

        let predictions = table
            .rows()
            .iter()
            .zip(probs)
            .map(|(row, p)| Prediction {
                match_id: row.match_id.clone(),
                date: row.date,
                team1: row.team1.clone(),
                team2: row.team2.clone(),
                features: row.features,
                p_team1_win: p,
                team1_win: row.label,
            })
            .collect();
        Ok((ratings, predictions))
    }

    /// Predict a single fixture from a rating state
    pub fn predict_fixture(&self, ratings: &EloRatings, team1: &str, team2: &str) -> Result<Prediction> {
        let record = MatchRecord::new(team1, team2, None);
        if record.team1 == record.team2 {
            return Err(ForecastError::InvalidArgument(format!(
                "a team cannot play itself: {}",
                record.team1
            )));
        }

        let features: EloFeatures = ratings.pre_match(&record).into();
        let p = self
            .model
            .predict_proba(&[features])?
            .into_iter()
            .next()
            .ok_or_else(|| ForecastError::Model("model returned no probability".to_string()))?;

        Ok(Prediction {
            match_id: None,
            date: None,
            team1: record.team1,
            team2: record.team2,
            features,
            p_team1_win: p,
            team1_win: None,
        })
    }

    /// Predictions for the held-out suffix of a labeled log
    pub fn test_block(
        &self,
        records: &[MatchRecord],
        split: &SplitConfig,
    ) -> Result<(TemporalSplit, Vec<Prediction>)> {
        let split = TemporalSplit::from_config(records.len(), split)?;
        let (_, mut predictions) = self.predict_log(records)?;
        let test = predictions.split_off(split.start);
        Ok((split, test))
    }
}

/// The last `n` predictions, or all of them when `n` is `None`
pub fn tail(predictions: &[Prediction], n: Option<usize>) -> &[Prediction] {
    match n {
        Some(n) => &predictions[predictions.len().saturating_sub(n)..],
        None => predictions,
    }
}

/// Format a single prediction for display
pub fn format_prediction(pred: &Prediction) -> String {
    let win_prob = pred.p_team1_win.max(1.0 - pred.p_team1_win);

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} vs {}
├─────────────────────────────────────────────────┤
│  Elo:              {:.0} - {:.0} (diff {:+.0})
│  Win probability:  {} {:.1}%
└─────────────────────────────────────────────────┘
"#,
        pred.team1,
        pred.team2,
        pred.features.elo1_before,
        pred.features.elo2_before,
        pred.features.elo_diff,
        pred.favourite(),
        win_prob * 100.0,
    )
}

/// Format predictions as an aligned table with discrete calls at `threshold`
pub fn format_table(predictions: &[Prediction], threshold: f64) -> String {
    let mut out = format!(
        "{:<12} {:<20} {:<20} {:>7} {:>7} {:>7} {:>6} {:>6} {:>7}\n",
        "match_id", "team1", "team2", "elo1", "elo2", "p_t1", "pred", "won", "correct"
    );
    for pred in predictions {
        let flag = |v: Option<bool>| match v {
            Some(true) => "1",
            Some(false) => "0",
            None => "-",
        };
        out.push_str(&format!(
            "{:<12} {:<20} {:<20} {:>7.1} {:>7.1} {:>7.3} {:>6} {:>6} {:>7}\n",
            pred.match_id.as_deref().unwrap_or("-"),
            pred.team1.as_str(),
            pred.team2.as_str(),
            pred.features.elo1_before,
            pred.features.elo2_before,
            pred.p_team1_win,
            flag(Some(pred.predicted_team1_win(threshold))),
            flag(pred.team1_win),
            flag(pred.is_correct(threshold)),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EloExpectedModel;

    fn predictor() -> Predictor {
        Predictor::new(Box::new(EloExpectedModel::new()), EloConfig::default())
    }

    #[test]
    fn test_upcoming_matches_do_not_move_ratings() {
        let records = vec![
            MatchRecord::new("A", "B", Some(true)),
            MatchRecord::new("A", "B", None),
            MatchRecord::new("A", "B", None),
        ];
        let (ratings, preds) = predictor().predict_log(&records).unwrap();

        assert_eq!(preds.len(), 3);
        assert_eq!(preds[0].p_team1_win, 0.5);
        assert_eq!(preds[1].features, preds[2].features);
        assert_eq!(preds[1].features.elo_diff, 32.0);
        assert!(preds[1].p_team1_win > 0.5);
        assert_eq!(ratings.get_rating(&"A".into()), 1516.0);
    }

    #[test]
    fn test_predict_fixture() {
        let p = predictor();
        let (ratings, _) = p
            .predict_log(&[MatchRecord::new("A", "B", Some(false))])
            .unwrap();

        let pred = p.predict_fixture(&ratings, "A", " B ").unwrap();
        assert_eq!(pred.team2.as_str(), "B");
        assert_eq!(pred.features.elo_diff, -32.0);
        assert!(pred.p_team1_win < 0.5);
        assert_eq!(pred.favourite().as_str(), "B");

        let unseen = p.predict_fixture(&ratings, "C", "D").unwrap();
        assert_eq!(unseen.p_team1_win, 0.5);

        assert!(p.predict_fixture(&ratings, "A", "A").is_err());
    }

    #[test]
    fn test_test_block_matches_split() {
        let records: Vec<MatchRecord> = (0..50)
            .map(|i| MatchRecord::new("A", "B", Some(i % 3 != 0)))
            .collect();
        let (split, preds) = predictor()
            .test_block(&records, &SplitConfig::default())
            .unwrap();
        assert_eq!(split.start, 40);
        assert_eq!(preds.len(), 10);

        let (_, all) = predictor().predict_log(&records).unwrap();
        assert_eq!(preds[0].features, all[40].features);
    }

    #[test]
    fn test_tail() {
        let records: Vec<MatchRecord> = (0..5).map(|_| MatchRecord::new("A", "B", Some(true))).collect();
        let (_, preds) = predictor().predict_log(&records).unwrap();
        assert_eq!(tail(&preds, Some(2)).len(), 2);
        assert_eq!(tail(&preds, Some(2))[1].features, preds[4].features);
        assert_eq!(tail(&preds, Some(10)).len(), 5);
        assert_eq!(tail(&preds, None).len(), 5);
    }

    #[test]
    fn test_format_table_marks_correctness() {
        let records = vec![
            MatchRecord::new("A", "B", Some(true)),
            MatchRecord::new("A", "B", Some(false)),
            MatchRecord::new("A", "B", None),
        ];
        let (_, preds) = predictor().predict_log(&records).unwrap();
        let table = format_table(&preds, 0.5);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("correct"));
        // 0.5 at the threshold predicts team1, which won
        assert!(lines[1].trim_end().ends_with('1'));
        // favoured after the first result, but lost
        assert!(lines[2].trim_end().ends_with('0'));
        assert!(lines[3].trim_end().ends_with('-'));
    }

    #[test]
    fn test_format_prediction_names_favourite() {
        let p = predictor();
        let (ratings, _) = p
            .predict_log(&[MatchRecord::new("Lions", "Tigers", Some(true))])
            .unwrap();
        let pred = p.predict_fixture(&ratings, "Tigers", "Lions").unwrap();
        let text = format_prediction(&pred);
        assert!(text.contains("Tigers vs Lions"));
        assert!(text.contains("Win probability:  Lions"));
    }
}
