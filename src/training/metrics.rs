//! Evaluation metrics for probabilistic win predictions
//!
//! Everything here works on predicted probabilities for team1 and the true
//! outcomes of the held-out suffix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EvaluationConfig, ForecastError, Result};

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs
pub const LOG_LOSS_EPS: f64 = 1e-15;

/// Confusion counts and derived scores at one threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscreteMetrics {
    pub threshold: f64,
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl DiscreteMetrics {
    /// `p >= threshold` predicts a team1 win
    pub fn at_threshold(probs: &[f64], labels: &[bool], threshold: f64) -> Result<Self> {
        check_inputs(probs, labels)?;
        check_threshold(threshold)?;

        let (mut tp, mut tn, mut fp, mut fn_) = (0, 0, 0, 0);
        for (&p, &actual) in probs.iter().zip(labels) {
            match (p >= threshold, actual) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(DiscreteMetrics {
            threshold,
            tp,
            tn,
            fp,
            fn_,
            accuracy: ratio(tp + tn, tp + tn + fp + fn_),
            precision,
            recall,
            f1,
        })
    }
}

/// One calibration bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    /// Smallest predicted probability in the bin
    pub lower: f64,
    /// Largest predicted probability in the bin
    pub upper: f64,
    pub mean_predicted: f64,
    pub observed_fraction: f64,
    pub count: usize,
}

/// Metrics record for a test suffix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub n_test: usize,
    pub log_loss: f64,
    /// Absent when the test set holds a single class
    pub roc_auc: Option<f64>,
    pub brier: f64,
    pub discrete: DiscreteMetrics,
    pub calibration: Vec<CalibrationBin>,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auc = match self.roc_auc {
            Some(auc) => format!("{:.4}", auc),
            None => "n/a".to_string(),
        };
        write!(
            f,
            "n={} | LogLoss: {:.4} | AUC: {} | Brier: {:.4} | Acc: {:.2}% | F1: {:.4}",
            self.n_test,
            self.log_loss,
            auc,
            self.brier,
            self.discrete.accuracy * 100.0,
            self.discrete.f1
        )
    }
}

/// Computes the metrics record over a test suffix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluator {
    pub threshold: f64,
    pub calibration_bins: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::from_config(&EvaluationConfig::default())
    }
}

impl Evaluator {
    pub fn new(threshold: f64, calibration_bins: usize) -> Self {
        Evaluator {
            threshold,
            calibration_bins,
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(config.decision_threshold, config.calibration_bins)
    }

    pub fn evaluate(&self, probs: &[f64], labels: &[bool]) -> Result<EvaluationReport> {
        check_inputs(probs, labels)?;
        check_threshold(self.threshold)?;

        Ok(EvaluationReport {
            n_test: probs.len(),
            log_loss: log_loss(probs, labels)?,
            roc_auc: roc_auc(probs, labels)?,
            brier: brier_score(probs, labels)?,
            discrete: DiscreteMetrics::at_threshold(probs, labels, self.threshold)?,
            calibration: calibration_curve(probs, labels, self.calibration_bins)?,
        })
    }
}

fn check_inputs(probs: &[f64], labels: &[bool]) -> Result<()> {
    if probs.is_empty() {
        return Err(ForecastError::EmptyTestSet);
    }
    if probs.len() != labels.len() {
        return Err(ForecastError::InvalidArgument(format!(
            "{} probabilities for {} labels",
            probs.len(),
            labels.len()
        )));
    }
    if let Some(bad) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(ForecastError::InvalidArgument(format!(
            "probability {} outside [0, 1]",
            bad
        )));
    }
    Ok(())
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ForecastError::InvalidArgument(format!(
            "decision threshold must be in [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

fn as_target(label: bool) -> f64 {
    if label {
        1.0
    } else {
        0.0
    }
}

/// Mean binary cross-entropy (natural log)
pub fn log_loss(probs: &[f64], labels: &[bool]) -> Result<f64> {
    check_inputs(probs, labels)?;
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(&p, &actual)| {
            let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            if actual {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    Ok(total / probs.len() as f64)
}

/// Mean squared error between probability and outcome
pub fn brier_score(probs: &[f64], labels: &[bool]) -> Result<f64> {
    check_inputs(probs, labels)?;
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(&p, &actual)| (p - as_target(actual)).powi(2))
        .sum();
    Ok(total / probs.len() as f64)
}

/// Area under the ROC curve, `None` when only one class is present
///
/// Rank statistic with tied scores sharing their average rank.
pub fn roc_auc(probs: &[f64], labels: &[bool]) -> Result<Option<f64>> {
    check_inputs(probs, labels)?;
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(None);
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; ties get the average of i+1..=j+1
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives = order[i..=j].iter().filter(|&&k| labels[k]).count();
        positive_rank_sum += avg_rank * positives as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok(Some(
        (positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg),
    ))
}

/// Calibration curve over quantile bins of the predicted probability
///
/// Predictions are ranked and cut into `n_bins` groups of (nearly) equal
/// size, so `n` predictions give `min(n, n_bins)` non-empty bins.
pub fn calibration_curve(probs: &[f64], labels: &[bool], n_bins: usize) -> Result<Vec<CalibrationBin>> {
    check_inputs(probs, labels)?;
    if n_bins == 0 {
        return Err(ForecastError::InvalidArgument(
            "calibration needs at least one bin".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let n = order.len();
    let bins = (0..n_bins)
        .filter_map(|b| {
            let members = &order[b * n / n_bins..(b + 1) * n / n_bins];
            if members.is_empty() {
                return None;
            }
            let count = members.len();
            let mean_predicted = members.iter().map(|&k| probs[k]).sum::<f64>() / count as f64;
            let positives = members.iter().filter(|&&k| labels[k]).count();
            Some(CalibrationBin {
                lower: probs[members[0]],
                upper: probs[members[count - 1]],
                mean_predicted,
                observed_fraction: positives as f64 / count as f64,
                count,
            })
        })
        .collect();
    Ok(bins)
}

/// Loss history while fitting a model
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub best_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    /// Smallest improvement that resets the patience counter
    pub const MIN_DELTA: f64 = 1e-6;

    pub fn new() -> Self {
        Self {
            best_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record the loss for an epoch
    pub fn record_epoch(&mut self, epoch: usize, loss: f64) {
        self.train_losses.push(loss);
        if loss < self.best_loss - Self::MIN_DELTA {
            self.best_loss = loss;
            self.best_epoch = epoch;
        }
    }

    /// Check if we should early stop
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if patience == 0 || self.train_losses.len() < patience {
            return false;
        }
        let current_epoch = self.train_losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }

    pub fn epochs(&self) -> usize {
        self.train_losses.len()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.train_losses.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy_nine_of_ten() {
        let probs = [0.9, 0.8, 0.7, 0.6, 0.55, 0.2, 0.3, 0.1, 0.4, 0.45];
        let labels = [true, true, true, true, true, false, false, false, false, true];
        let m = DiscreteMetrics::at_threshold(&probs, &labels, 0.5).unwrap();
        assert_relative_eq!(m.accuracy, 0.9);
        assert_eq!((m.tp, m.tn, m.fp, m.fn_), (5, 4, 0, 1));
        assert_relative_eq!(m.precision, 1.0);
        assert_relative_eq!(m.recall, 5.0 / 6.0);
        assert_relative_eq!(m.f1, 2.0 * (5.0 / 6.0) / (1.0 + 5.0 / 6.0));
    }

    #[test]
    fn test_single_class_auc_absent() {
        let probs = [0.9, 0.8, 0.7, 0.6, 0.55, 0.2, 0.3, 0.1, 0.4, 0.45];
        let labels = [true; 10];
        let report = Evaluator::default().evaluate(&probs, &labels).unwrap();
        assert_eq!(report.roc_auc, None);
        assert!(report.log_loss.is_finite());
        assert_relative_eq!(report.discrete.accuracy, 0.5);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["roc_auc"].is_null());
        assert_eq!(json["discrete"]["fn"], 5);
    }

    #[test]
    fn test_auc_perfect_inverse_and_ties() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels).unwrap(), Some(1.0));
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels).unwrap(), Some(0.0));
        assert_eq!(roc_auc(&[0.5; 4], &labels).unwrap(), Some(0.5));
    }

    #[test]
    fn test_auc_partial_ordering() {
        // One of four positive/negative pairs is misordered
        let probs = [0.1, 0.6, 0.4, 0.9];
        let labels = [false, false, true, true];
        assert_relative_eq!(roc_auc(&probs, &labels).unwrap().unwrap(), 0.75);
    }

    #[test]
    fn test_log_loss_values() {
        assert_relative_eq!(log_loss(&[0.5, 0.5], &[true, false]).unwrap(), 2f64.ln());
        assert_relative_eq!(
            log_loss(&[0.8], &[true]).unwrap(),
            -(0.8f64).ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_log_loss_clips_extremes() {
        let loss = log_loss(&[0.0, 1.0], &[true, false]).unwrap();
        assert!(loss.is_finite());
        assert_relative_eq!(loss, -(LOG_LOSS_EPS).ln(), max_relative = 1e-3);
        assert!(log_loss(&[1.0, 0.0], &[true, false]).unwrap() < 1e-12);
    }

    #[test]
    fn test_brier() {
        assert_relative_eq!(brier_score(&[0.5, 0.5], &[true, false]).unwrap(), 0.25);
        assert_relative_eq!(brier_score(&[1.0, 0.0], &[true, false]).unwrap(), 0.0);
        assert_relative_eq!(brier_score(&[0.7], &[false]).unwrap(), 0.49, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_denominators() {
        let m = DiscreteMetrics::at_threshold(&[0.1, 0.2], &[false, false], 0.5).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let m = DiscreteMetrics::at_threshold(&[0.5], &[true], 0.5).unwrap();
        assert_eq!(m.tp, 1);
    }

    #[test]
    fn test_discrete_rejects_bad_input() {
        assert!(matches!(
            DiscreteMetrics::at_threshold(&[0.9, 0.1, 0.8], &[true, false], 0.5),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert!(matches!(
            DiscreteMetrics::at_threshold(&[0.9], &[true], 1.5),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert!(matches!(
            DiscreteMetrics::at_threshold(&[], &[], 0.5),
            Err(ForecastError::EmptyTestSet)
        ));
    }

    #[test]
    fn test_calibration_ten_bins() {
        let probs: Vec<f64> = (0..100).map(|i| ((i * 37) % 100) as f64 / 100.0).collect();
        let labels: Vec<bool> = (0..100).map(|i| i % 3 == 0).collect();
        let bins = calibration_curve(&probs, &labels, 10).unwrap();

        assert_eq!(bins.len(), 10);
        for bin in &bins {
            assert_eq!(bin.count, 10);
            assert!(bin.lower <= bin.mean_predicted && bin.mean_predicted <= bin.upper);
            assert!((0.0..=1.0).contains(&bin.observed_fraction));
        }
        for pair in bins.windows(2) {
            assert!(pair[0].upper <= pair[1].lower);
        }
        assert_relative_eq!(bins[0].mean_predicted, 0.045, epsilon = 1e-12);
    }

    #[test]
    fn test_calibration_fewer_predictions_than_bins() {
        let bins = calibration_curve(&[0.2, 0.9, 0.4], &[false, true, true], 10).unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[1].mean_predicted, 0.4);
        assert_eq!(bins[1].observed_fraction, 1.0);
        assert!(calibration_curve(&[0.2], &[true], 0).is_err());
    }

    #[test]
    fn test_empty_and_mismatched_inputs() {
        let evaluator = Evaluator::default();
        assert!(matches!(
            evaluator.evaluate(&[], &[]),
            Err(ForecastError::EmptyTestSet)
        ));
        assert!(matches!(
            evaluator.evaluate(&[0.5], &[true, false]),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert!(matches!(
            evaluator.evaluate(&[1.5], &[true]),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert!(evaluator.evaluate(&[f64::NAN], &[true]).is_err());
    }

    #[test]
    fn test_single_row_is_valid() {
        let report = Evaluator::default().evaluate(&[0.7], &[true]).unwrap();
        assert_eq!(report.n_test, 1);
        assert_eq!(report.calibration.len(), 1);
        assert_eq!(report.roc_auc, None);
    }

    #[test]
    fn test_history_early_stop() {
        let mut history = TrainingHistory::new();
        for (epoch, loss) in [0.7, 0.6, 0.5, 0.5, 0.5, 0.5].iter().enumerate() {
            history.record_epoch(epoch, *loss);
        }
        assert_eq!(history.best_epoch, 2);
        assert!(history.should_early_stop(3));
        assert!(!history.should_early_stop(4));
        assert!(!history.should_early_stop(0));
        assert_eq!(history.final_loss(), Some(0.5));
    }
}
