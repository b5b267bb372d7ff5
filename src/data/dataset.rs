//! Feature table aligned with the match log
//!
//! One row per match, in log order: identifiers, the Elo features the match
//! was played with, and the outcome label when one exists.

use std::io::Write;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::features::{build_elo_features, EloConfig, EloFeatures, EloRatings};
use crate::{ForecastError, MatchRecord, Result, TeamId};

/// A single feature row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Position in the ordered log
    pub index: usize,
    pub match_id: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub team1: TeamId,
    pub team2: TeamId,
    pub features: EloFeatures,
    pub label: Option<bool>,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    match_id: Option<&'a str>,
    date: Option<NaiveDateTime>,
    team1: &'a str,
    team2: &'a str,
    elo1_before: f64,
    elo2_before: f64,
    elo_diff: f64,
    team1_win: Option<u8>,
}

/// Feature rows for a whole log, in chronological order
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Replay Elo over the ordered records and build one row per record
    ///
    /// Also returns the rating state after the last record.
    pub fn build(records: &[MatchRecord], config: EloConfig) -> (EloRatings, Self) {
        let (state, features) = build_elo_features(records, config);
        let rows = records
            .iter()
            .zip(features)
            .enumerate()
            .map(|(index, (record, features))| FeatureRow {
                index,
                match_id: record.match_id.clone(),
                date: record.date,
                team1: record.team1.clone(),
                team2: record.team2.clone(),
                features,
                label: record.team1_win,
            })
            .collect();
        (state, FeatureTable { rows })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn features(&self) -> Vec<EloFeatures> {
        self.rows.iter().map(|r| r.features).collect()
    }

    /// Labels for every row; fails if any row has no outcome
    pub fn labels(&self) -> Result<Vec<bool>> {
        self.rows
            .iter()
            .map(|r| {
                r.label.ok_or_else(|| {
                    ForecastError::Input(format!(
                        "match {} ({} vs {}) has no outcome label",
                        r.match_id.as_deref().unwrap_or("?"),
                        r.team1,
                        r.team2
                    ))
                })
            })
            .collect()
    }

    /// Write the table as CSV (three feature columns plus the label)
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in &self.rows {
            wtr.serialize(CsvRow {
                match_id: row.match_id.as_deref(),
                date: row.date,
                team1: row.team1.as_str(),
                team2: row.team2.as_str(),
                elo1_before: row.features.elo1_before,
                elo2_before: row.features.elo2_before,
                elo_diff: row.features.elo_diff,
                team1_win: row.label.map(u8::from),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}
