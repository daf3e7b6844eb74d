//! The `entrust faculty` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use entrust_core::model::Role;
use entrust_core::overview::{faculty_overview, FacultyOverview};

use super::Workspace;

pub fn execute(
    dataset: PathBuf,
    faculty: String,
    format: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(&dataset, config)?;
    let faculty = workspace.actor(&faculty)?;
    if faculty.role != Role::Faculty {
        anyhow::bail!("{} is {}, not faculty", faculty.display_name(), faculty.role);
    }

    let overview = faculty_overview(
        faculty.id,
        &workspace.dataset.actors,
        &workspace.dataset.evaluations,
    );

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&overview)?),
        _ => print_overview(&overview),
    }
    Ok(())
}

fn print_overview(overview: &FacultyOverview) {
    println!(
        "{}: {} completed, average given {}",
        overview.name, overview.completed, overview.average_given
    );

    let mut residents = Table::new();
    residents.set_header(vec!["Resident", "PGY", "Completed", "Avg given", "Trend"]);
    for r in &overview.residents {
        residents.add_row(vec![
            Cell::new(&r.name),
            Cell::new(r.pgy_year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(r.completed),
            Cell::new(r.average_given.to_string()),
            Cell::new(r.trend.to_string()),
        ]);
    }
    println!("\nResidents\n{residents}");

    if !overview.by_pgy.is_empty() {
        println!("\nBy training year:");
        for p in &overview.by_pgy {
            let year = p
                .pgy_year
                .map(|y| format!("PGY-{y}"))
                .unwrap_or_else(|| "unknown".into());
            println!("  {year:<8} {:>4} rated, average {}", p.rated, p.average_given);
        }
    }

    if !overview.by_complexity.is_empty() {
        println!("\nBy complexity:");
        for c in &overview.by_complexity {
            println!(
                "  {:<16} {:>4} rated, average {}",
                c.complexity.to_string(),
                c.rated,
                c.average_given
            );
        }
    }
}
