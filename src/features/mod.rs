//! Feature extraction
//!
//! Replays Elo ratings over the ordered match log and turns pre-match ratings
//! into model-ready rows.

pub mod elo;
pub mod match_repr;

pub use elo::{expected_score, EloConfig, EloRatings, PreMatchRatings};
pub use match_repr::{assemble, EloFeatures};

use crate::MatchRecord;

/// Replay ratings over an ordered stream and assemble one feature row per record
pub fn build_elo_features(records: &[MatchRecord], config: EloConfig) -> (EloRatings, Vec<EloFeatures>) {
    let (state, pre_match) = EloRatings::new(config).replay(records);
    (state, assemble(&pre_match))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_elo_features_aligned() {
        let records = vec![
            MatchRecord::new("A", "B", Some(true)),
            MatchRecord::new("C", "A", None),
            MatchRecord::new("A", "B", Some(false)),
        ];
        let (state, features) = build_elo_features(&records, EloConfig::default());
        assert_eq!(features.len(), records.len());
        assert_eq!(features[0], EloFeatures::from_ratings(1500.0, 1500.0));
        assert_eq!(features[1], EloFeatures::from_ratings(1500.0, 1516.0));
        assert_eq!(features[2], EloFeatures::from_ratings(1516.0, 1484.0));
        assert_eq!(state.team_count(), 2);
    }
}
