//! Per-EPA entrustment aggregation for one resident.
//!
//! All reductions are linear folds over completed evaluations. Time-range
//! filtering is applied before anything is folded, so trends compare within
//! the window.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalogue::Catalogue;
use crate::model::{Epa, Evaluation};
use crate::scale::{EntrustmentLevel, PRACTICE_READY_THRESHOLD};

/// Rater disagreement at or above which an evaluation is flagged.
pub const DEFAULT_VARIANCE_FLAG: u8 = 2;

/// The level used for aggregation: the faculty's if present, otherwise the
/// resident's self-assessment. `None` when neither party rated.
pub fn authoritative_level(evaluation: &Evaluation) -> Option<EntrustmentLevel> {
    evaluation
        .submissions
        .faculty
        .entrustment_level
        .or(evaluation.submissions.resident.entrustment_level)
}

/// `|rank(faculty) - rank(resident)|` when both parties rated.
pub fn variance(evaluation: &Evaluation) -> Option<u8> {
    let faculty = evaluation.submissions.faculty.entrustment_level?;
    let resident = evaluation.submissions.resident.entrustment_level?;
    Some(faculty.rank().abs_diff(resident.rank()))
}

/// Average entrustment for an EPA, or an explicit absence of data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntrustmentScore {
    NoData,
    Average(f64),
}

impl EntrustmentScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            EntrustmentScore::NoData => None,
            EntrustmentScore::Average(v) => Some(*v),
        }
    }

    pub fn is_practice_ready(&self) -> bool {
        self.value().is_some_and(|v| v >= PRACTICE_READY_THRESHOLD)
    }
}

impl fmt::Display for EntrustmentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrustmentScore::NoData => write!(f, "no data"),
            EntrustmentScore::Average(v) => write!(f, "{v:.1}/4"),
        }
    }
}

/// Direction of the two most recent ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
    None,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Stable => write!(f, "stable"),
            Trend::None => write!(f, "none"),
        }
    }
}

/// Coarse progress band for an EPA average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessBand {
    NotStarted,
    NeedsFocus,
    Progressing,
    PracticeReady,
}

impl ReadinessBand {
    pub fn from_score(score: EntrustmentScore) -> Self {
        match score.value() {
            None => ReadinessBand::NotStarted,
            Some(v) if v >= PRACTICE_READY_THRESHOLD => ReadinessBand::PracticeReady,
            Some(v) if v >= 2.5 => ReadinessBand::Progressing,
            Some(_) => ReadinessBand::NeedsFocus,
        }
    }
}

impl fmt::Display for ReadinessBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessBand::NotStarted => write!(f, "not started"),
            ReadinessBand::NeedsFocus => write!(f, "needs focus"),
            ReadinessBand::Progressing => write!(f, "progressing"),
            ReadinessBand::PracticeReady => write!(f, "practice ready"),
        }
    }
}

/// Calendar look-back windows offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    /// Earliest `created_at` still inside the window, `None` for `All`.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = match self {
            TimeRange::OneMonth => 1,
            TimeRange::ThreeMonths => 3,
            TimeRange::SixMonths => 6,
            TimeRange::OneYear => 12,
            TimeRange::All => return None,
        };
        now.checked_sub_months(Months::new(months))
    }

    pub fn window(self, now: DateTime<Utc>) -> DateWindow {
        DateWindow {
            from: self.cutoff(now),
            to: None,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::OneMonth => write!(f, "1m"),
            TimeRange::ThreeMonths => write!(f, "3m"),
            TimeRange::SixMonths => write!(f, "6m"),
            TimeRange::OneYear => write!(f, "1y"),
            TimeRange::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(TimeRange::OneMonth),
            "3m" => Ok(TimeRange::ThreeMonths),
            "6m" => Ok(TimeRange::SixMonths),
            "1y" | "12m" => Ok(TimeRange::OneYear),
            "all" => Ok(TimeRange::All),
            other => Err(format!("unknown time range: {other}")),
        }
    }
}

/// Inclusive-from, exclusive-to window on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Aggregated view of one EPA for one resident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpaSummary {
    pub epa_id: Uuid,
    pub code: String,
    pub title: String,
    pub average_entrustment: EntrustmentScore,
    /// Completed evaluations for this EPA, rated or not.
    pub evaluation_count: usize,
    pub trend: Trend,
    pub latest_level: Option<EntrustmentLevel>,
    pub band: ReadinessBand,
}

/// Faculty and resident disagreed on one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaterVariance {
    pub evaluation_id: Uuid,
    pub epa_id: Uuid,
    pub faculty_level: EntrustmentLevel,
    pub resident_level: EntrustmentLevel,
    pub variance: u8,
}

/// A resident's entrustment picture across the whole catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyProfile {
    pub resident_id: Uuid,
    pub window: DateWindow,
    /// One entry per catalogue EPA, in catalogue order.
    pub epas: Vec<EpaSummary>,
    /// Fraction of catalogue EPAs with at least one evaluation.
    pub coverage: f64,
    pub practice_ready_count: usize,
    pub evaluation_count: usize,
    /// Every evaluation where both parties rated, with their disagreement.
    pub rater_variance: Vec<RaterVariance>,
}

impl CompetencyProfile {
    pub fn epa(&self, epa_id: Uuid) -> Option<&EpaSummary> {
        self.epas.iter().find(|s| s.epa_id == epa_id)
    }

    pub fn by_code(&self, code: &str) -> Option<&EpaSummary> {
        self.epas.iter().find(|s| s.code.eq_ignore_ascii_case(code))
    }

    /// EPAs touched at least once.
    pub fn covered(&self) -> usize {
        self.epas.iter().filter(|s| s.evaluation_count > 0).count()
    }

    /// Evaluations whose rater disagreement reaches `min_variance`.
    pub fn flagged(&self, min_variance: u8) -> impl Iterator<Item = &RaterVariance> {
        self.rater_variance
            .iter()
            .filter(move |v| v.variance >= min_variance)
    }

    /// Mean of the per-EPA averages that have data.
    pub fn overall_average(&self) -> EntrustmentScore {
        let values: Vec<f64> = self
            .epas
            .iter()
            .filter_map(|s| s.average_entrustment.value())
            .collect();
        mean(&values)
    }
}

pub(crate) fn mean(values: &[f64]) -> EntrustmentScore {
    if values.is_empty() {
        EntrustmentScore::NoData
    } else {
        EntrustmentScore::Average(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Summarize one EPA from its evaluations, already sorted by `created_at`.
pub fn summarize_epa(epa: &Epa, chronological: &[&Evaluation]) -> EpaSummary {
    let rated: Vec<EntrustmentLevel> = chronological
        .iter()
        .filter_map(|e| authoritative_level(e))
        .collect();
    let ranks: Vec<f64> = rated.iter().map(|l| f64::from(l.rank())).collect();
    let average_entrustment = mean(&ranks);

    let trend = match rated.as_slice() {
        [.., previous, latest] => match latest.cmp(previous) {
            std::cmp::Ordering::Greater => Trend::Up,
            std::cmp::Ordering::Less => Trend::Down,
            std::cmp::Ordering::Equal => Trend::Stable,
        },
        _ => Trend::None,
    };

    EpaSummary {
        epa_id: epa.id,
        code: epa.code.clone(),
        title: epa.title.clone(),
        average_entrustment,
        evaluation_count: chronological.len(),
        trend,
        latest_level: rated.last().copied(),
        band: ReadinessBand::from_score(average_entrustment),
    }
}

/// Fold a resident's evaluations into a competency profile.
///
/// Records that are not completed, belong to another resident, fall outside
/// `window`, or reference an EPA missing from the catalogue are skipped.
pub fn competency_profile(
    resident_id: Uuid,
    evaluations: &[Evaluation],
    catalogue: &Catalogue,
    window: DateWindow,
) -> CompetencyProfile {
    let mut in_scope: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.resident_id == resident_id && e.is_completed())
        .filter(|e| window.contains(e.created_at))
        .collect();
    in_scope.sort_by_key(|e| e.created_at);

    let mut by_epa: HashMap<Uuid, Vec<&Evaluation>> = HashMap::new();
    for evaluation in &in_scope {
        if catalogue.get(evaluation.epa_id).is_none() {
            tracing::warn!(
                evaluation = %evaluation.id,
                epa = %evaluation.epa_id,
                "evaluation references an EPA outside the catalogue, skipping"
            );
            continue;
        }
        by_epa.entry(evaluation.epa_id).or_default().push(evaluation);
    }

    let epas: Vec<EpaSummary> = catalogue
        .epas
        .iter()
        .map(|epa| {
            let group = by_epa.get(&epa.id).map(Vec::as_slice).unwrap_or(&[]);
            summarize_epa(epa, group)
        })
        .collect();

    let covered = epas.iter().filter(|s| s.evaluation_count > 0).count();
    let coverage = if catalogue.is_empty() {
        0.0
    } else {
        covered as f64 / catalogue.len() as f64
    };
    let practice_ready_count = epas
        .iter()
        .filter(|s| s.average_entrustment.is_practice_ready())
        .count();

    let rater_variance = in_scope
        .iter()
        .filter_map(|e| {
            let faculty_level = e.submissions.faculty.entrustment_level?;
            let resident_level = e.submissions.resident.entrustment_level?;
            Some(RaterVariance {
                evaluation_id: e.id,
                epa_id: e.epa_id,
                faculty_level,
                resident_level,
                variance: faculty_level.rank().abs_diff(resident_level.rank()),
            })
        })
        .collect();

    tracing::debug!(
        resident = %resident_id,
        evaluations = in_scope.len(),
        covered,
        "built competency profile"
    );

    CompetencyProfile {
        resident_id,
        window,
        epas,
        coverage,
        practice_ready_count,
        evaluation_count: in_scope.len(),
        rater_variance,
    }
}

/// One rated point on an EPA's learning curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePoint {
    pub evaluation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub level: EntrustmentLevel,
}

/// Chronological authoritative ratings of one EPA for one resident.
pub fn learning_curve(
    resident_id: Uuid,
    epa_id: Uuid,
    evaluations: &[Evaluation],
    window: DateWindow,
) -> Vec<CurvePoint> {
    let mut points: Vec<CurvePoint> = evaluations
        .iter()
        .filter(|e| e.resident_id == resident_id && e.epa_id == epa_id && e.is_completed())
        .filter(|e| window.contains(e.created_at))
        .filter_map(|e| {
            authoritative_level(e).map(|level| CurvePoint {
                evaluation_id: e.id,
                created_at: e.created_at,
                level,
            })
        })
        .collect();
    points.sort_by_key(|p| p.created_at);
    points
}
