//! Competency report snapshots with JSON persistence and progress comparison.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{CompetencyProfile, TimeRange};
use crate::model::Actor;

/// A saved competency profile for one resident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub resident: ResidentSummary,
    pub range: TimeRange,
    pub profile: CompetencyProfile,
}

/// The resident a report is about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidentSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub pgy_year: Option<u8>,
}

impl CompetencyReport {
    pub fn new(resident: &Actor, range: TimeRange, profile: CompetencyProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            resident: ResidentSummary {
                id: resident.id,
                name: resident.display_name(),
                pgy_year: resident.pgy_year,
            },
            range,
            profile,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }

    /// Compare this report against an earlier one.
    ///
    /// Only EPAs with a rated average in a report take part. A change
    /// counts once its magnitude exceeds `threshold` scale points.
    pub fn compare(&self, baseline: &CompetencyReport, threshold: f64) -> ProgressReport {
        let averages = |report: &CompetencyReport| -> BTreeMap<String, f64> {
            report
                .profile
                .epas
                .iter()
                .filter_map(|s| s.average_entrustment.value().map(|v| (s.code.clone(), v)))
                .collect()
        };

        let baseline_scores = averages(baseline);
        let current_scores = averages(self);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_epas = Vec::new();

        for (code, &current) in &current_scores {
            let Some(&baseline_value) = baseline_scores.get(code) else {
                new_epas.push(code.clone());
                continue;
            };
            let change = EpaChange {
                code: code.clone(),
                baseline: baseline_value,
                current,
                delta: current - baseline_value,
            };
            if change.delta < -threshold {
                regressions.push(change);
            } else if change.delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        let removed_epas = baseline_scores
            .keys()
            .filter(|code| !current_scores.contains_key(*code))
            .cloned()
            .collect();

        ProgressReport {
            regressions,
            improvements,
            unchanged,
            new_epas,
            removed_epas,
            coverage_delta: self.profile.coverage - baseline.profile.coverage,
        }
    }
}

/// Result of comparing two competency reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub regressions: Vec<EpaChange>,
    pub improvements: Vec<EpaChange>,
    pub unchanged: usize,
    /// Rated now, unrated in the baseline.
    pub new_epas: Vec<String>,
    /// Rated in the baseline, unrated now.
    pub removed_epas: Vec<String>,
    pub coverage_delta: f64,
}

/// Movement of one EPA's average entrustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpaChange {
    pub code: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

impl ProgressReport {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged, {} newly rated\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged,
            self.new_epas.len()
        ));
        md.push_str(&format!(
            "**Coverage change:** {:+.1}%\n\n",
            self.coverage_delta * 100.0
        ));

        for (title, changes) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| EPA | Baseline | Current | Delta |\n");
            md.push_str("|-----|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {:.2} | {:.2} | {:+.2} |\n",
                    c.code, c.baseline, c.current, c.delta
                ));
            }
            md.push('\n');
        }

        if !self.new_epas.is_empty() {
            md.push_str(&format!("**Newly rated:** {}\n", self.new_epas.join(", ")));
        }

        md
    }

    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}
