//! Analytics views: institution-wide for program administrators, and the
//! supervision picture for one faculty member.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{authoritative_level, mean, EntrustmentScore, Trend};
use crate::catalogue::Catalogue;
use crate::model::{Actor, Complexity, Evaluation, Role};

/// Look-back used for "recent" activity counts.
pub const RECENT_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidentStanding {
    High,
    Average,
    NeedsAttention,
    NoData,
}

impl ResidentStanding {
    fn from_score(score: EntrustmentScore) -> Self {
        match score.value() {
            None => ResidentStanding::NoData,
            Some(v) if v >= 3.0 => ResidentStanding::High,
            Some(v) if v >= 2.0 => ResidentStanding::Average,
            Some(_) => ResidentStanding::NeedsAttention,
        }
    }
}

impl fmt::Display for ResidentStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResidentStanding::High => write!(f, "high"),
            ResidentStanding::Average => write!(f, "average"),
            ResidentStanding::NeedsAttention => write!(f, "needs attention"),
            ResidentStanding::NoData => write!(f, "no data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacultyActivity {
    Active,
    Moderate,
    Inactive,
}

impl FacultyActivity {
    fn from_recent(recent: usize) -> Self {
        match recent {
            5.. => FacultyActivity::Active,
            2.. => FacultyActivity::Moderate,
            _ => FacultyActivity::Inactive,
        }
    }
}

impl fmt::Display for FacultyActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacultyActivity::Active => write!(f, "active"),
            FacultyActivity::Moderate => write!(f, "moderate"),
            FacultyActivity::Inactive => write!(f, "inactive"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidentRow {
    pub resident_id: Uuid,
    pub name: String,
    pub pgy_year: Option<u8>,
    pub completed: usize,
    pub recent: usize,
    pub average: EntrustmentScore,
    pub standing: ResidentStanding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyRow {
    pub faculty_id: Uuid,
    pub name: String,
    pub completed: usize,
    pub recent: usize,
    /// Mean of the levels this faculty member assigned.
    pub average_given: EntrustmentScore,
    pub activity: FacultyActivity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpaCount {
    pub code: String,
    pub completed: usize,
}

/// Completed evaluations created in one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPoint {
    /// `YYYY-MM`.
    pub month: String,
    pub completed: usize,
    pub average: EntrustmentScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramOverview {
    pub institution_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub completed: usize,
    pub open: usize,
    pub average: EntrustmentScore,
    pub residents: Vec<ResidentRow>,
    pub faculty: Vec<FacultyRow>,
    /// Most evaluated first.
    pub epa_distribution: Vec<EpaCount>,
    /// Oldest month first.
    pub monthly: Vec<MonthlyPoint>,
}

fn levels(evaluations: &[&Evaluation]) -> EntrustmentScore {
    let values: Vec<f64> = evaluations
        .iter()
        .filter_map(|e| authoritative_level(e))
        .map(|l| f64::from(l.rank()))
        .collect();
    mean(&values)
}

/// Summarize one institution's activity as of `now`.
pub fn program_overview(
    institution_id: Uuid,
    actors: &[Actor],
    evaluations: &[Evaluation],
    catalogue: &Catalogue,
    now: DateTime<Utc>,
) -> ProgramOverview {
    let recent_cutoff = now - Duration::days(RECENT_DAYS);
    let in_institution: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.institution_id == institution_id)
        .collect();
    let completed: Vec<&Evaluation> = in_institution
        .iter()
        .copied()
        .filter(|e| e.is_completed())
        .collect();

    let mut by_resident: HashMap<Uuid, Vec<&Evaluation>> = HashMap::new();
    let mut by_faculty: HashMap<Uuid, Vec<&Evaluation>> = HashMap::new();
    for e in &completed {
        by_resident.entry(e.resident_id).or_default().push(e);
        by_faculty.entry(e.faculty_id).or_default().push(e);
    }
    let recent = |evals: &[&Evaluation]| evals.iter().filter(|e| e.created_at > recent_cutoff).count();

    let members = actors.iter().filter(|a| a.institution_id == institution_id);

    let mut residents = Vec::new();
    let mut faculty = Vec::new();
    for actor in members {
        match actor.role {
            Role::Resident => {
                let evals = by_resident.get(&actor.id).map(Vec::as_slice).unwrap_or(&[]);
                let average = levels(evals);
                residents.push(ResidentRow {
                    resident_id: actor.id,
                    name: actor.display_name(),
                    pgy_year: actor.pgy_year,
                    completed: evals.len(),
                    recent: recent(evals),
                    average,
                    standing: ResidentStanding::from_score(average),
                });
            }
            Role::Faculty => {
                let evals = by_faculty.get(&actor.id).map(Vec::as_slice).unwrap_or(&[]);
                let given: Vec<f64> = evals.iter().filter_map(|e| given_rank(e)).collect();
                let recent = recent(evals);
                faculty.push(FacultyRow {
                    faculty_id: actor.id,
                    name: actor.display_name(),
                    completed: evals.len(),
                    recent,
                    average_given: mean(&given),
                    activity: FacultyActivity::from_recent(recent),
                });
            }
            Role::Admin => {}
        }
    }
    residents.sort_by(|a, b| a.name.cmp(&b.name));
    faculty.sort_by(|a, b| a.name.cmp(&b.name));

    let mut per_epa: HashMap<Uuid, usize> = HashMap::new();
    for e in &completed {
        *per_epa.entry(e.epa_id).or_default() += 1;
    }
    let mut epa_distribution: Vec<EpaCount> = catalogue
        .epas
        .iter()
        .filter_map(|epa| {
            per_epa.get(&epa.id).map(|&completed| EpaCount {
                code: epa.code.clone(),
                completed,
            })
        })
        .collect();
    // Stable sort keeps catalogue order among ties
    epa_distribution.sort_by(|a, b| b.completed.cmp(&a.completed));

    let mut months: BTreeMap<String, Vec<&Evaluation>> = BTreeMap::new();
    for e in &completed {
        months
            .entry(e.created_at.format("%Y-%m").to_string())
            .or_default()
            .push(e);
    }
    let monthly = months
        .into_iter()
        .map(|(month, evals)| MonthlyPoint {
            month,
            completed: evals.len(),
            average: levels(&evals),
        })
        .collect();

    tracing::debug!(
        institution = %institution_id,
        completed = completed.len(),
        residents = residents.len(),
        faculty = faculty.len(),
        "built program overview"
    );

    ProgramOverview {
        institution_id,
        generated_at: now,
        completed: completed.len(),
        open: in_institution.len() - completed.len(),
        average: levels(&completed),
        residents,
        faculty,
        epa_distribution,
        monthly,
    }
}

/// A resident as seen by one supervising faculty member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedResident {
    pub resident_id: Uuid,
    pub name: String,
    pub pgy_year: Option<u8>,
    pub completed: usize,
    pub average_given: EntrustmentScore,
    /// First given level against the latest one.
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgyAverage {
    /// `None` groups residents with no recorded training year.
    pub pgy_year: Option<u8>,
    pub rated: usize,
    pub average_given: EntrustmentScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAverage {
    pub complexity: Complexity,
    pub rated: usize,
    pub average_given: EntrustmentScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacultyOverview {
    pub faculty_id: Uuid,
    pub name: String,
    pub completed: usize,
    pub average_given: EntrustmentScore,
    pub residents: Vec<SupervisedResident>,
    /// Ascending training year, unknown year first.
    pub by_pgy: Vec<PgyAverage>,
    /// Only complexities the faculty member actually recorded.
    pub by_complexity: Vec<ComplexityAverage>,
}

fn given_rank(evaluation: &Evaluation) -> Option<f64> {
    evaluation
        .submissions
        .faculty
        .entrustment_level
        .map(|l| f64::from(l.rank()))
}

fn direction(first: f64, last: f64) -> Trend {
    match last.partial_cmp(&first) {
        Some(std::cmp::Ordering::Greater) => Trend::Up,
        Some(std::cmp::Ordering::Less) => Trend::Down,
        _ => Trend::Stable,
    }
}

/// Summarize the completed evaluations `faculty_id` took part in.
///
/// Every figure uses the level the faculty member gave. Records where they
/// left no level count toward `completed` but never toward an average.
pub fn faculty_overview(
    faculty_id: Uuid,
    actors: &[Actor],
    evaluations: &[Evaluation],
) -> FacultyOverview {
    let mut supervised: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|e| e.faculty_id == faculty_id && e.is_completed())
        .collect();
    supervised.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let actor = |id: Uuid| actors.iter().find(|a| a.id == id);

    let mut by_resident: HashMap<Uuid, Vec<&Evaluation>> = HashMap::new();
    let mut pgy: BTreeMap<Option<u8>, Vec<f64>> = BTreeMap::new();
    let mut complexity: HashMap<Complexity, Vec<f64>> = HashMap::new();
    let mut all_given = Vec::new();
    for e in &supervised {
        by_resident.entry(e.resident_id).or_default().push(e);
        let Some(level) = given_rank(e) else { continue };
        all_given.push(level);
        let year = actor(e.resident_id).and_then(|a| a.pgy_year);
        pgy.entry(year).or_default().push(level);
        if let Some(c) = e.submissions.faculty.complexity {
            complexity.entry(c).or_default().push(level);
        }
    }

    let mut residents: Vec<SupervisedResident> = by_resident
        .into_iter()
        .map(|(resident_id, evals)| {
            let levels: Vec<f64> = evals.iter().filter_map(|e| given_rank(e)).collect();
            let trend = match levels.as_slice() {
                [first, .., last] => direction(*first, *last),
                _ => Trend::None,
            };
            let resident = actor(resident_id);
            SupervisedResident {
                resident_id,
                name: resident
                    .map(Actor::display_name)
                    .unwrap_or_else(|| resident_id.to_string()),
                pgy_year: resident.and_then(|a| a.pgy_year),
                completed: evals.len(),
                average_given: mean(&levels),
                trend,
            }
        })
        .collect();
    residents.sort_by(|a, b| a.name.cmp(&b.name));

    let by_pgy = pgy
        .into_iter()
        .map(|(pgy_year, levels)| PgyAverage {
            pgy_year,
            rated: levels.len(),
            average_given: mean(&levels),
        })
        .collect();

    let by_complexity = [Complexity::Straightforward, Complexity::Moderate, Complexity::Complex]
        .into_iter()
        .filter_map(|c| {
            complexity.get(&c).map(|levels| ComplexityAverage {
                complexity: c,
                rated: levels.len(),
                average_given: mean(levels),
            })
        })
        .collect();

    tracing::debug!(
        faculty = %faculty_id,
        completed = supervised.len(),
        residents = residents.len(),
        "built faculty overview"
    );

    FacultyOverview {
        faculty_id,
        name: actor(faculty_id)
            .map(Actor::display_name)
            .unwrap_or_else(|| faculty_id.to_string()),
        completed: supervised.len(),
        average_given: mean(&all_given),
        residents,
        by_pgy,
        by_complexity,
    }
}
