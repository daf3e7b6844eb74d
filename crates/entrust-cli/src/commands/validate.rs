//! The `entrust validate` command.

use std::path::PathBuf;

use anyhow::Result;

use entrust_core::catalogue::validate_catalogue;
use entrust_core::dataset::validate_dataset;

use super::Workspace;

pub fn execute(dataset: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::load(&dataset, config)?;

    println!(
        "Catalogue: {} ({} EPAs)",
        workspace.catalogue.name,
        workspace.catalogue.len()
    );
    let catalogue_warnings = validate_catalogue(&workspace.catalogue);
    for w in &catalogue_warnings {
        let prefix = w
            .code
            .as_ref()
            .map(|code| format!("  [{code}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    println!(
        "Dataset: {} actors, {} evaluations",
        workspace.dataset.actors.len(),
        workspace.dataset.evaluations.len()
    );
    let dataset_warnings = validate_dataset(&workspace.dataset, &workspace.catalogue);
    for w in &dataset_warnings {
        let prefix = w
            .evaluation_id
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    let total = catalogue_warnings.len() + dataset_warnings.len();
    if total == 0 {
        println!("Dataset valid.");
    } else {
        println!("\n{total} warning(s) found.");
    }

    Ok(())
}
