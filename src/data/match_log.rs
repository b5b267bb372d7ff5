//! CSV match log loading and normalization
//!
//! Turns a raw match table into a single deterministic chronological stream:
//! names are trimmed, the outcome label is derived from the winner column and
//! rows are sorted by parsed date, then by match id.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::{ForecastError, MatchRecord, Result, TeamId};

/// How outcome labels are treated while loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Training/evaluation: a `winner` column is mandatory and only completed
    /// matches are kept
    Required,
    /// Inference: every row is kept; only completed rows with a winner carry an
    /// outcome, everything else is unlabeled
    Optional,
}

/// Summary of a loaded log
#[derive(Debug, Clone, PartialEq)]
pub struct LogStats {
    pub match_count: usize,
    pub labeled_count: usize,
    pub team_count: usize,
    pub earliest_match: Option<NaiveDateTime>,
    pub latest_match: Option<NaiveDateTime>,
}

/// Chronologically ordered match log
#[derive(Debug, Clone, Default)]
pub struct MatchLog {
    records: Vec<MatchRecord>,
}

struct Columns {
    team1: usize,
    team2: usize,
    winner: Option<usize>,
    status: Option<usize>,
    date: Option<usize>,
    match_id: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, policy: LabelPolicy) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        let (team1, team2) = match (find("team1"), find("team2")) {
            (Some(t1), Some(t2)) => (t1, t2),
            _ => {
                return Err(ForecastError::Input(
                    "CSV must contain columns: team1, team2".to_string(),
                ))
            }
        };

        let winner = find("winner");
        if winner.is_none() && policy == LabelPolicy::Required {
            return Err(ForecastError::Input(
                "CSV must contain columns: team1, winner".to_string(),
            ));
        }

        Ok(Columns {
            team1,
            team2,
            winner,
            status: find("status"),
            date: find("date"),
            match_id: find("match_id"),
        })
    }
}

impl MatchLog {
    /// Load a log from a CSV file
    pub fn load<P: AsRef<Path>>(path: P, policy: LabelPolicy) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ForecastError::Input(format!("Failed to open match log {}: {}", path.display(), e))
        })?;
        let log = Self::from_reader(file, policy)?;
        log::info!("Loaded {} matches from {}", log.len(), path.display());
        Ok(log)
    }

    /// Load a log from any CSV source
    pub fn from_reader<R: Read>(reader: R, policy: LabelPolicy) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let columns = Columns::from_headers(&headers, policy)?;

        let mut records = Vec::new();
        let mut skipped_status = 0usize;
        let mut skipped_invalid = 0usize;
        let mut unmatched_winner = 0usize;
        let mut unparsed_dates = 0usize;

        for row in rdr.records() {
            let row = row?;
            let field = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(str::trim);

            let completed = match field(columns.status) {
                Some(status) => status.eq_ignore_ascii_case("completed"),
                None => true,
            };
            if policy == LabelPolicy::Required && !completed {
                skipped_status += 1;
                continue;
            }

            let team1 = field(Some(columns.team1)).unwrap_or_default();
            let team2 = field(Some(columns.team2)).unwrap_or_default();
            if team1.is_empty() || team2.is_empty() {
                skipped_invalid += 1;
                continue;
            }

            let winner = field(columns.winner).filter(|w| !w.is_empty());
            let team1_win = match (completed, winner) {
                (true, Some(winner)) => {
                    if winner != team1 && winner != team2 {
                        unmatched_winner += 1;
                    }
                    Some(winner == team1)
                }
                _ => None,
            };
            if policy == LabelPolicy::Required && team1_win.is_none() {
                skipped_invalid += 1;
                continue;
            }

            let date_text = field(columns.date).filter(|d| !d.is_empty());
            let date = date_text.and_then(parse_date);
            if date_text.is_some() && date.is_none() {
                unparsed_dates += 1;
            }

            records.push(MatchRecord {
                match_id: field(columns.match_id)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
                date,
                team1: TeamId::new(team1),
                team2: TeamId::new(team2),
                team1_win,
            });
        }

        if skipped_status > 0 {
            log::info!("Skipped {} matches that are not completed", skipped_status);
        }
        if skipped_invalid > 0 {
            log::warn!("Skipped {} rows with a missing team or winner", skipped_invalid);
        }
        if unmatched_winner > 0 {
            log::warn!(
                "{} rows name a winner that matches neither team; labeled as team1 loss",
                unmatched_winner
            );
        }
        if unparsed_dates > 0 {
            log::warn!("{} rows have an unparseable date; ordered last", unparsed_dates);
        }

        Ok(Self::from_records(records))
    }

    /// Build a log from already-normalized records, sorting them chronologically
    pub fn from_records(mut records: Vec<MatchRecord>) -> Self {
        sort_chronologically(&mut records);
        MatchLog { records }
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> LogStats {
        let teams: HashSet<&TeamId> = self
            .records
            .iter()
            .flat_map(|r| [&r.team1, &r.team2])
            .collect();
        let dates = self.records.iter().filter_map(|r| r.date);

        LogStats {
            match_count: self.records.len(),
            labeled_count: self.records.iter().filter(|r| r.is_labeled()).count(),
            team_count: teams.len(),
            earliest_match: dates.clone().min(),
            latest_match: dates.max(),
        }
    }
}

/// Stable sort: parsed date first (undated rows last), then match id
pub fn sort_chronologically(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| {
        let by_date = (a.date.is_none(), a.date).cmp(&(b.date.is_none(), b.date));
        by_date.then_with(|| match_id_key(&a.match_id).cmp(&match_id_key(&b.match_id)))
    });
}

/// Numeric ids sort numerically, then textual ids, then missing ids
fn match_id_key(id: &Option<String>) -> (u8, i64, &str) {
    match id.as_deref() {
        Some(text) => match text.parse::<i64>() {
            Ok(n) => (0, n, ""),
            Err(_) => (1, 0, text),
        },
        None => (2, 0, ""),
    }
}

/// Parse the date formats found in scraped match logs
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%a, %B %d, %Y"];
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
