//! The `entrust buckets` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use entrust_core::catalogue::Catalogue;
use entrust_core::lifecycle;
use entrust_core::model::{Actor, Evaluation};
use entrust_core::viewer::{classify, needs_action, Bucket};

use super::Workspace;

pub async fn execute(dataset: PathBuf, viewer: String, config: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::load(&dataset, config)?;
    let viewer = workspace.actor(&viewer)?;
    let names: Vec<Actor> = workspace.dataset.actors.clone();
    // Initiated by the viewer, counterparty done, viewer still owes a rating
    let mut to_rate: Vec<Evaluation> = workspace
        .dataset
        .evaluations
        .iter()
        .filter(|e| classify(e, &viewer) == Bucket::None && needs_action(e, &viewer))
        .cloned()
        .collect();
    to_rate.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let service = workspace.into_service();
    let buckets = service.buckets_for(viewer.id).await?;

    println!(
        "{} ({}): {} in feed, {} in inbox, {} pending",
        viewer.display_name(),
        viewer.role,
        buckets.feed.len(),
        buckets.inbox.len(),
        buckets.pending.len()
    );

    for (title, records) in [
        ("Inbox", &buckets.inbox),
        ("Pending", &buckets.pending),
        ("Awaiting your rating", &to_rate),
        ("Feed", &buckets.feed),
    ] {
        if records.is_empty() {
            continue;
        }
        println!("\n{title}");
        println!("{}", render(records, &viewer, &names, service.catalogue()));
    }

    Ok(())
}

fn render(records: &[Evaluation], viewer: &Actor, actors: &[Actor], catalogue: &Catalogue) -> Table {
    let name = |id: uuid::Uuid| {
        actors
            .iter()
            .find(|a| a.id == id)
            .map(Actor::display_name)
            .unwrap_or_else(|| id.to_string())
    };

    let mut table = Table::new();
    table.set_header(vec!["Created", "EPA", "Resident", "Faculty", "State", "Action"]);
    for e in records {
        let epa = catalogue
            .get(e.epa_id)
            .map(|epa| epa.code.clone())
            .unwrap_or_else(|| e.epa_id.to_string());
        table.add_row(vec![
            Cell::new(e.created_at.format("%Y-%m-%d")),
            Cell::new(epa),
            Cell::new(name(e.resident_id)),
            Cell::new(name(e.faculty_id)),
            Cell::new(lifecycle::state(e).to_string()),
            Cell::new(if needs_action(e, viewer) { "rate" } else { "" }),
        ]);
    }
    table
}
