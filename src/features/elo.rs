//! Elo rating system for team strength estimation
//!
//! Ratings are replayed over a chronologically ordered match stream. For every
//! match the engine reports the ratings both teams held immediately before it,
//! then applies the result. Matches without a known result are reported but
//! never move the ratings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{MatchRecord, TeamId};

/// Elo rating configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    /// Starting rating for teams not seen yet
    pub base_rating: f64,
    /// K-factor: how much ratings change per match
    pub k_factor: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig {
            base_rating: 1500.0,
            k_factor: 32.0,
        }
    }
}

/// Expected score of a team rated `r1` against a team rated `r2`
pub fn expected_score(r1: f64, r2: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r2 - r1) / 400.0))
}

/// Ratings held by both sides right before a match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreMatchRatings {
    pub team1: f64,
    pub team2: f64,
}

/// Elo rating state for one pass over a match log
///
/// Owns the team → rating map exclusively. Clone it to run an independent pass
/// from the same starting point.
#[derive(Debug, Clone, PartialEq)]
pub struct EloRatings {
    ratings: HashMap<TeamId, f64>,
    config: EloConfig,
}

impl Default for EloRatings {
    fn default() -> Self {
        Self::new(EloConfig::default())
    }
}

impl EloRatings {
    pub fn new(config: EloConfig) -> Self {
        EloRatings {
            ratings: HashMap::new(),
            config,
        }
    }

    /// Get current rating for a team (base rating if unknown)
    pub fn get_rating(&self, team: &TeamId) -> f64 {
        self.ratings
            .get(team)
            .copied()
            .unwrap_or(self.config.base_rating)
    }

    /// Whether the team has had at least one rated match
    pub fn contains(&self, team: &TeamId) -> bool {
        self.ratings.contains_key(team)
    }

    /// Number of teams with a materialized rating
    pub fn team_count(&self) -> usize {
        self.ratings.len()
    }

    /// Materialized ratings, highest first (ties broken by name)
    pub fn standings(&self) -> Vec<(TeamId, f64)> {
        let mut table: Vec<(TeamId, f64)> = self
            .ratings
            .iter()
            .map(|(team, rating)| (team.clone(), *rating))
            .collect();
        table.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        table
    }

    /// Ratings of both sides as they stand now
    pub fn pre_match(&self, record: &MatchRecord) -> PreMatchRatings {
        PreMatchRatings {
            team1: self.get_rating(&record.team1),
            team2: self.get_rating(&record.team2),
        }
    }

    /// Apply a result between two teams
    ///
    /// The rating change is computed once and applied with opposite signs, so
    /// the update is zero-sum.
    pub fn update(&mut self, team1: &TeamId, team2: &TeamId, team1_won: bool) {
        let r1 = self.get_rating(team1);
        let r2 = self.get_rating(team2);

        let actual = if team1_won { 1.0 } else { 0.0 };
        let delta = self.config.k_factor * (actual - expected_score(r1, r2));

        self.ratings.insert(team1.clone(), r1 + delta);
        self.ratings.insert(team2.clone(), r2 - delta);
    }

    /// Read pre-match ratings, then apply the result if there is one
    pub fn observe(&mut self, record: &MatchRecord) -> PreMatchRatings {
        let before = self.pre_match(record);
        if let Some(team1_won) = record.team1_win {
            self.update(&record.team1, &record.team2, team1_won);
        }
        before
    }

    /// One fold step: `(state, record) -> (state', pre-match ratings)`
    pub fn step(mut self, record: &MatchRecord) -> (Self, PreMatchRatings) {
        let before = self.observe(record);
        (self, before)
    }

    /// Replay an ordered stream from this state, left to right
    ///
    /// Returns the final state and one pre-match pair per record, aligned by
    /// position.
    pub fn replay<'a, I>(self, records: I) -> (Self, Vec<PreMatchRatings>)
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        records
            .into_iter()
            .fold((self, Vec::new()), |(state, mut out), record| {
                let (state, before) = state.step(record);
                out.push(before);
                (state, out)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn make_match(team1: &str, team2: &str, team1_win: Option<bool>) -> MatchRecord {
        MatchRecord::new(team1, team2, team1_win)
    }

    fn random_stream(seed: u64, n: usize) -> Vec<MatchRecord> {
        let teams = ["A", "B", "C", "D", "E", "F"];
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let i = rng.gen_range(0..teams.len());
                let j = (i + rng.gen_range(1..teams.len())) % teams.len();
                let outcome = if rng.gen_bool(0.9) {
                    Some(rng.gen_bool(0.5))
                } else {
                    None
                };
                make_match(teams[i], teams[j], outcome)
            })
            .collect()
    }

    #[test]
    fn test_initial_ratings() {
        let elo = EloRatings::default();
        assert_eq!(elo.get_rating(&TeamId::new("A")), 1500.0);
        assert_eq!(elo.get_rating(&TeamId::new("nobody")), 1500.0);
        assert_eq!(elo.team_count(), 0);
    }

    #[test]
    fn test_expected_score_equal_ratings() {
        assert_eq!(expected_score(1500.0, 1500.0), 0.5);
        assert!(expected_score(1600.0, 1500.0) > 0.5);
        assert!(expected_score(1400.0, 1500.0) < 0.5);
    }

    #[test]
    fn test_expected_score_symmetry() {
        for (r1, r2) in [(1500.0, 1500.0), (1712.5, 1388.25), (900.0, 2100.0), (1500.0, 1499.0)] {
            assert_relative_eq!(
                expected_score(r1, r2) + expected_score(r2, r1),
                1.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_two_match_scenario() {
        let records = vec![
            make_match("A", "B", Some(true)),
            make_match("A", "B", Some(true)),
        ];
        let (state, pre) = EloRatings::default().replay(&records);

        assert_eq!(pre[0], PreMatchRatings { team1: 1500.0, team2: 1500.0 });
        assert_eq!(pre[1], PreMatchRatings { team1: 1516.0, team2: 1484.0 });
        assert!(state.get_rating(&TeamId::new("A")) > 1516.0);
    }

    #[test]
    fn test_update_after_first_win() {
        let mut elo = EloRatings::default();
        elo.update(&TeamId::new("A"), &TeamId::new("B"), true);
        assert_eq!(elo.get_rating(&TeamId::new("A")), 1516.0);
        assert_eq!(elo.get_rating(&TeamId::new("B")), 1484.0);
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let mut favourite_wins = EloRatings::default();
        let mut upset = EloRatings::default();
        let strong = TeamId::new("Strong");
        let weak = TeamId::new("Weak");
        for elo in [&mut favourite_wins, &mut upset] {
            for _ in 0..5 {
                elo.update(&strong, &weak, true);
            }
        }
        let before = favourite_wins.get_rating(&strong);
        favourite_wins.update(&strong, &weak, true);
        upset.update(&strong, &weak, false);

        let gain = favourite_wins.get_rating(&strong) - before;
        let loss = before - upset.get_rating(&strong);
        assert!(gain > 0.0 && loss > gain);
    }

    #[test]
    fn test_update_is_zero_sum() {
        let mut elo = EloRatings::default();
        for record in random_stream(7, 200) {
            let before = elo.pre_match(&record);
            elo.observe(&record);
            if record.is_labeled() && record.team1 != record.team2 {
                let d1 = elo.get_rating(&record.team1) - before.team1;
                let d2 = elo.get_rating(&record.team2) - before.team2;
                assert_relative_eq!(d1, -d2, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_unseen_team_gets_base_rating() {
        let records = random_stream(11, 300);
        let (_, pre) = EloRatings::default().replay(&records);
        let mut rated = std::collections::HashSet::new();
        for (record, before) in records.iter().zip(&pre) {
            if !rated.contains(&record.team1) {
                assert_eq!(before.team1, 1500.0);
            }
            if !rated.contains(&record.team2) {
                assert_eq!(before.team2, 1500.0);
            }
            if record.is_labeled() {
                rated.insert(record.team1.clone());
                rated.insert(record.team2.clone());
            }
        }
    }

    #[test]
    fn test_unlabeled_match_does_not_update() {
        let mut elo = EloRatings::default();
        elo.observe(&make_match("A", "B", Some(true)));
        let snapshot = elo.clone();

        let before = elo.observe(&make_match("A", "B", None));
        assert_eq!(before, PreMatchRatings { team1: 1516.0, team2: 1484.0 });
        assert_eq!(elo, snapshot);

        // A never-seen team in an unlabeled match is not materialized
        elo.observe(&make_match("C", "A", None));
        assert!(!elo.contains(&TeamId::new("C")));
    }

    #[test]
    fn test_pre_match_excludes_own_result() {
        let mut win = EloRatings::default();
        let mut loss = EloRatings::default();
        let a = win.observe(&make_match("A", "B", Some(true)));
        let b = loss.observe(&make_match("A", "B", Some(false)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let records = random_stream(42, 500);
        let (state_a, pre_a) = EloRatings::default().replay(&records);
        let (state_b, pre_b) = EloRatings::default().replay(&records);
        assert_eq!(pre_a, pre_b);
        assert_eq!(state_a, state_b);
    }

    #[test]
    fn test_replay_matches_observe_loop() {
        let records = random_stream(3, 100);
        let (folded, pre_fold) = EloRatings::default().replay(&records);

        let mut looped = EloRatings::default();
        let pre_loop: Vec<_> = records.iter().map(|r| looped.observe(r)).collect();

        assert_eq!(pre_fold, pre_loop);
        assert_eq!(folded, looped);
    }

    #[test]
    fn test_independent_passes_from_clone() {
        let mut start = EloRatings::default();
        start.observe(&make_match("A", "B", Some(true)));

        let (left, _) = start.clone().replay(&[make_match("A", "B", Some(false))]);
        let (right, _) = start.clone().replay(&[make_match("A", "B", Some(true))]);

        assert_eq!(start.get_rating(&TeamId::new("A")), 1516.0);
        assert!(left.get_rating(&TeamId::new("A")) < right.get_rating(&TeamId::new("A")));
    }

    #[test]
    fn test_self_match_is_not_special_cased() {
        let mut elo = EloRatings::default();
        let before = elo.observe(&make_match("A", "A", Some(true)));
        assert_eq!(before.team1, before.team2);
        // The second write wins
        assert_eq!(elo.get_rating(&TeamId::new("A")), 1484.0);
    }

    #[test]
    fn test_custom_config() {
        let config = EloConfig {
            base_rating: 1000.0,
            k_factor: 10.0,
        };
        let (state, pre) = EloRatings::new(config).replay(&[make_match("A", "B", Some(false))]);
        assert_eq!(pre[0].team1, 1000.0);
        assert_eq!(state.get_rating(&TeamId::new("A")), 995.0);
        assert_eq!(state.get_rating(&TeamId::new("B")), 1005.0);
    }

    #[test]
    fn test_standings_order() {
        let mut elo = EloRatings::default();
        elo.observe(&make_match("A", "B", Some(true)));
        elo.observe(&make_match("C", "B", Some(true)));
        let table = elo.standings();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].0.as_str(), "A");
        assert_eq!(table[2].0.as_str(), "B");
    }
}
