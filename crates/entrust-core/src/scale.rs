//! The four-level entrustment scale.
//!
//! Levels are totally ordered from least to most independent. An unset level
//! is represented as `Option::None` by callers and never ranked.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Average entrustment at or above which an EPA counts as practice ready.
pub const PRACTICE_READY_THRESHOLD: f64 = 3.5;

/// How much supervision a trainee needs for a given activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrustmentLevel {
    ObservationOnly,
    DirectSupervision,
    IndirectSupervision,
    PracticeReady,
}

impl EntrustmentLevel {
    pub const ALL: [EntrustmentLevel; 4] = [
        EntrustmentLevel::ObservationOnly,
        EntrustmentLevel::DirectSupervision,
        EntrustmentLevel::IndirectSupervision,
        EntrustmentLevel::PracticeReady,
    ];

    /// Ordinal rank, 1 (observation only) through 4 (practice ready).
    pub fn rank(self) -> u8 {
        match self {
            EntrustmentLevel::ObservationOnly => 1,
            EntrustmentLevel::DirectSupervision => 2,
            EntrustmentLevel::IndirectSupervision => 3,
            EntrustmentLevel::PracticeReady => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(EntrustmentLevel::ObservationOnly),
            2 => Some(EntrustmentLevel::DirectSupervision),
            3 => Some(EntrustmentLevel::IndirectSupervision),
            4 => Some(EntrustmentLevel::PracticeReady),
            _ => None,
        }
    }

    /// The level an average rank is displayed as.
    ///
    /// Cut points sit halfway between ranks: `>= 3.5` is practice ready,
    /// `>= 2.5` indirect, `>= 1.5` direct, anything lower observation only.
    pub fn nearest(average: f64) -> Self {
        if average >= PRACTICE_READY_THRESHOLD {
            EntrustmentLevel::PracticeReady
        } else if average >= 2.5 {
            EntrustmentLevel::IndirectSupervision
        } else if average >= 1.5 {
            EntrustmentLevel::DirectSupervision
        } else {
            EntrustmentLevel::ObservationOnly
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntrustmentLevel::ObservationOnly => "Observation Only",
            EntrustmentLevel::DirectSupervision => "Direct Supervision",
            EntrustmentLevel::IndirectSupervision => "Indirect Supervision",
            EntrustmentLevel::PracticeReady => "Practice Ready",
        }
    }
}

/// Rank of a level. Free-function form of [`EntrustmentLevel::rank`].
pub fn rank(level: EntrustmentLevel) -> u8 {
    level.rank()
}

/// Compare two levels on the entrustment scale.
pub fn compare(a: EntrustmentLevel, b: EntrustmentLevel) -> Ordering {
    a.rank().cmp(&b.rank())
}

impl PartialOrd for EntrustmentLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntrustmentLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(*self, *other)
    }
}

impl fmt::Display for EntrustmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrustmentLevel::ObservationOnly => write!(f, "observation_only"),
            EntrustmentLevel::DirectSupervision => write!(f, "direct_supervision"),
            EntrustmentLevel::IndirectSupervision => write!(f, "indirect_supervision"),
            EntrustmentLevel::PracticeReady => write!(f, "practice_ready"),
        }
    }
}

impl FromStr for EntrustmentLevel {
    type Err = String;

    /// Only the named wire values are accepted; numeric strings are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "observation_only" => Ok(EntrustmentLevel::ObservationOnly),
            "direct_supervision" => Ok(EntrustmentLevel::DirectSupervision),
            "indirect_supervision" => Ok(EntrustmentLevel::IndirectSupervision),
            "practice_ready" => Ok(EntrustmentLevel::PracticeReady),
            other => Err(format!("unknown entrustment level: {other}")),
        }
    }
}
