//! CSV and JSON artifacts for predictions and evaluations

use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::training::metrics::CalibrationBin;
use crate::{Prediction, Result};

#[derive(Serialize)]
struct PredictionRow<'a> {
    match_id: Option<&'a str>,
    date: Option<NaiveDateTime>,
    team1: &'a str,
    team2: &'a str,
    elo1_before: f64,
    elo2_before: f64,
    elo_diff: f64,
    p_team1_win: f64,
    pred: u8,
    team1_win: Option<u8>,
    correct: Option<u8>,
}

/// Write predictions with their features and discrete calls at `threshold`
pub fn write_predictions_csv<W: Write>(predictions: &[Prediction], threshold: f64, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for pred in predictions {
        wtr.serialize(PredictionRow {
            match_id: pred.match_id.as_deref(),
            date: pred.date,
            team1: pred.team1.as_str(),
            team2: pred.team2.as_str(),
            elo1_before: pred.features.elo1_before,
            elo2_before: pred.features.elo2_before,
            elo_diff: pred.features.elo_diff,
            p_team1_win: pred.p_team1_win,
            pred: u8::from(pred.predicted_team1_win(threshold)),
            team1_win: pred.team1_win.map(u8::from),
            correct: pred.is_correct(threshold).map(u8::from),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write calibration bins, one per line
pub fn write_calibration_csv<W: Write>(bins: &[CalibrationBin], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bin in bins {
        wtr.serialize(bin)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pretty-printed JSON file, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Create a CSV file, creating parent directories
pub fn create_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::fs::File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::EloFeatures;
    use crate::training::metrics::calibration_curve;

    fn prediction(p: f64, won: Option<bool>) -> Prediction {
        Prediction {
            match_id: Some("7".to_string()),
            date: None,
            team1: "A".into(),
            team2: "B".into(),
            features: EloFeatures::from_ratings(1516.0, 1484.0),
            p_team1_win: p,
            team1_win: won,
        }
    }

    #[test]
    fn test_predictions_csv_columns() {
        let mut buf = Vec::new();
        write_predictions_csv(
            &[prediction(0.75, Some(false)), prediction(0.25, None)],
            0.5,
            &mut buf,
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "match_id,date,team1,team2,elo1_before,elo2_before,elo_diff,p_team1_win,pred,team1_win,correct"
        );
        assert_eq!(lines[1], "7,,A,B,1516.0,1484.0,32.0,0.75,1,0,0");
        assert_eq!(lines[2], "7,,A,B,1516.0,1484.0,32.0,0.25,0,,");
    }

    #[test]
    fn test_calibration_csv() {
        let probs = [0.1, 0.2, 0.8, 0.9];
        let labels = [false, false, true, true];
        let bins = calibration_curve(&probs, &labels, 2).unwrap();

        let mut buf = Vec::new();
        write_calibration_csv(&bins, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "lower,upper,mean_predicted,observed_fraction,count");
        assert!(lines[2].ends_with(",1.0,2"));
    }

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json(&path, &serde_json::json!({"n_test": 3})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"n_test\": 3"));
    }
}
