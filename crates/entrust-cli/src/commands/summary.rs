//! The `entrust summary` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use entrust_core::aggregate::{CompetencyProfile, TimeRange, DEFAULT_VARIANCE_FLAG};
use entrust_core::catalogue::Catalogue;
use entrust_core::report::CompetencyReport;

use super::Workspace;

pub async fn execute(
    dataset: PathBuf,
    resident: String,
    range: Option<String>,
    save: Option<PathBuf>,
    format: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(&dataset, config)?;
    let resident = workspace.actor(&resident)?;
    let range = match range {
        Some(r) => r.parse::<TimeRange>().map_err(anyhow::Error::msg)?,
        None => workspace.config.default_range,
    };

    let service = workspace.into_service();
    let profile = service
        .profile_for(resident.id, range, chrono::Utc::now())
        .await?;

    let report = CompetencyReport::new(&resident, range, profile);
    if let Some(path) = &save {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_profile(&report, service.catalogue()),
    }

    Ok(())
}

fn print_profile(report: &CompetencyReport, catalogue: &Catalogue) {
    let profile: &CompetencyProfile = &report.profile;

    println!(
        "{}{}, range {}",
        report.resident.name,
        report
            .resident
            .pgy_year
            .map(|y| format!(" (PGY-{y})"))
            .unwrap_or_default(),
        report.range
    );
    println!(
        "Coverage: {}/{} EPAs ({:.0}%), practice ready: {}, evaluations: {}, overall: {}",
        profile.covered(),
        catalogue.len(),
        profile.coverage * 100.0,
        profile.practice_ready_count,
        profile.evaluation_count,
        profile.overall_average()
    );

    let mut table = Table::new();
    table.set_header(vec!["EPA", "Title", "Average", "Evals", "Trend", "Latest", "Band"]);
    for summary in &profile.epas {
        table.add_row(vec![
            Cell::new(&summary.code),
            Cell::new(&summary.title),
            Cell::new(summary.average_entrustment.to_string()),
            Cell::new(summary.evaluation_count),
            Cell::new(summary.trend.to_string()),
            Cell::new(
                summary
                    .latest_level
                    .map(|l| l.label().to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(summary.band.to_string()),
        ]);
    }
    println!("{table}");

    let flagged: Vec<_> = profile.flagged(DEFAULT_VARIANCE_FLAG).collect();
    if !flagged.is_empty() {
        println!("\nRater disagreement (>= {DEFAULT_VARIANCE_FLAG} levels):");
        for v in flagged {
            let code = catalogue
                .get(v.epa_id)
                .map(|e| e.code.as_str())
                .unwrap_or("?");
            println!(
                "  {} {}: faculty {} vs resident {}",
                v.evaluation_id, code, v.faculty_level, v.resident_level
            );
        }
    }
}
