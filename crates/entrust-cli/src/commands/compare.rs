//! The `entrust compare` command.

use std::path::PathBuf;

use anyhow::Result;

use entrust_core::report::CompetencyReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    let baseline = CompetencyReport::load_json(&baseline_path)?;
    let current = CompetencyReport::load_json(&current_path)?;

    if baseline.resident.id != current.resident.id {
        tracing::warn!(
            baseline = %baseline.resident.name,
            current = %current.resident.name,
            "comparing reports for different residents"
        );
    }

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );

            for (title, changes) in [
                ("Regressions", &report.regressions),
                ("Improvements", &report.improvements),
            ] {
                if changes.is_empty() {
                    continue;
                }
                println!("\n{title}:");
                for c in changes {
                    println!(
                        "  {} {:.2} -> {:.2} ({:+.2})",
                        c.code, c.baseline, c.current, c.delta
                    );
                }
            }

            if !report.new_epas.is_empty() {
                println!("\nNewly rated: {}", report.new_epas.join(", "));
            }
            if !report.removed_epas.is_empty() {
                println!("No longer rated: {}", report.removed_epas.join(", "));
            }
            println!("Coverage change: {:+.1}%", report.coverage_delta * 100.0);
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
