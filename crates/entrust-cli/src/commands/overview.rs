//! The `entrust overview` command.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use uuid::Uuid;

use entrust_core::overview::{program_overview, ProgramOverview};

use super::Workspace;

pub fn execute(
    dataset: PathBuf,
    institution: Option<String>,
    format: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(&dataset, config)?;

    let institution_id = match institution {
        Some(id) => id
            .parse::<Uuid>()
            .with_context(|| format!("invalid institution id: {id}"))?,
        None => {
            let institutions: BTreeSet<Uuid> = workspace
                .dataset
                .actors
                .iter()
                .map(|a| a.institution_id)
                .collect();
            match institutions.len() {
                0 => anyhow::bail!("dataset has no actors"),
                1 => *institutions.iter().next().context("dataset has no actors")?,
                n => anyhow::bail!("dataset spans {n} institutions, pass --institution"),
            }
        }
    };

    let overview = program_overview(
        institution_id,
        &workspace.dataset.actors,
        &workspace.dataset.evaluations,
        &workspace.catalogue,
        chrono::Utc::now(),
    );

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&overview)?),
        _ => print_overview(&overview),
    }
    Ok(())
}

fn print_overview(overview: &ProgramOverview) {
    println!(
        "Institution {}: {} completed, {} open, average {}",
        overview.institution_id, overview.completed, overview.open, overview.average
    );

    let mut residents = Table::new();
    residents.set_header(vec!["Resident", "PGY", "Completed", "Last 30d", "Average", "Standing"]);
    for r in &overview.residents {
        residents.add_row(vec![
            Cell::new(&r.name),
            Cell::new(r.pgy_year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(r.completed),
            Cell::new(r.recent),
            Cell::new(r.average.to_string()),
            Cell::new(r.standing.to_string()),
        ]);
    }
    println!("\nResidents\n{residents}");

    let mut faculty = Table::new();
    faculty.set_header(vec!["Faculty", "Completed", "Last 30d", "Avg given", "Activity"]);
    for f in &overview.faculty {
        faculty.add_row(vec![
            Cell::new(&f.name),
            Cell::new(f.completed),
            Cell::new(f.recent),
            Cell::new(f.average_given.to_string()),
            Cell::new(f.activity.to_string()),
        ]);
    }
    println!("\nFaculty\n{faculty}");

    if !overview.epa_distribution.is_empty() {
        println!("\nEPA distribution:");
        for epa in &overview.epa_distribution {
            println!("  {:<8} {}", epa.code, epa.completed);
        }
    }

    if !overview.monthly.is_empty() {
        println!("\nMonthly:");
        for m in &overview.monthly {
            println!("  {}  {:>4} completed, average {}", m.month, m.completed, m.average);
        }
    }
}
