//! Match feature representation for model input
//!
//! Each match becomes the pre-match ratings of both sides and their signed
//! difference.

use serde::{Deserialize, Serialize};

use super::elo::PreMatchRatings;

/// Elo features for a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EloFeatures {
    pub elo1_before: f64,
    pub elo2_before: f64,
    pub elo_diff: f64,
}

impl EloFeatures {
    pub const DIM: usize = 3;

    /// Column names, in `to_array` order
    pub const NAMES: [&'static str; Self::DIM] = ["elo1_before", "elo2_before", "elo_diff"];

    pub fn from_ratings(elo1_before: f64, elo2_before: f64) -> Self {
        EloFeatures {
            elo1_before,
            elo2_before,
            elo_diff: elo1_before - elo2_before,
        }
    }

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [self.elo1_before, self.elo2_before, self.elo_diff]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl From<PreMatchRatings> for EloFeatures {
    fn from(pre: PreMatchRatings) -> Self {
        EloFeatures::from_ratings(pre.team1, pre.team2)
    }
}

/// Wrap a stream of pre-match rating pairs into feature rows, position for position
pub fn assemble(pre_match: &[PreMatchRatings]) -> Vec<EloFeatures> {
    pre_match.iter().copied().map(EloFeatures::from).collect()
}
