//! The `entrust init` command.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use uuid::Uuid;

use entrust_core::catalogue::Catalogue;
use entrust_core::dataset::Dataset;
use entrust_core::lifecycle::{self, NewEvaluation};
use entrust_core::model::{Actor, Assessment, Complexity, Domain, Party, Role};
use entrust_core::scale::EntrustmentLevel;

pub fn execute() -> Result<()> {
    if Path::new("entrust.toml").exists() {
        println!("entrust.toml already exists, skipping.");
    } else {
        std::fs::write("entrust.toml", SAMPLE_CONFIG)?;
        println!("Created entrust.toml");
    }

    let example_path = Path::new("datasets/example.json");
    if example_path.exists() {
        println!("datasets/example.json already exists, skipping.");
    } else {
        example_dataset()?.save_json(example_path)?;
        println!("Created datasets/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit entrust.toml (set OPENAI_API_KEY to enable case classification)");
    println!("  2. Run: entrust validate --dataset datasets/example.json");
    println!("  3. Run: entrust summary --dataset datasets/example.json --resident \"Ana Rivera\"");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# entrust configuration

min_confidence = 0.5
max_retries = 3
retry_delay_ms = 1000
default_range = "all"

# catalogue = "catalogue.toml"

[classifier]
type = "openai"
api_key = "${OPENAI_API_KEY}"
model = "gpt-4o-mini"
"#;

fn actor(role: Role, institution_id: Uuid, name: &str, pgy_year: Option<u8>) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role,
        institution_id,
        pgy_year,
        name: Some(name.to_string()),
    }
}

/// A small program: two residents, two faculty, a few months of evaluations.
fn example_dataset() -> Result<Dataset> {
    use EntrustmentLevel::*;

    let catalogue = Catalogue::surgical();
    let institution = Uuid::new_v4();
    let ana = actor(Role::Resident, institution, "Ana Rivera", Some(4));
    let ben = actor(Role::Resident, institution, "Ben Cho", Some(2));
    let okafor = actor(Role::Faculty, institution, "Dr. Okafor", None);
    let lind = actor(Role::Faculty, institution, "Dr. Lind", None);
    let admin = actor(Role::Admin, institution, "Program Office", None);

    // (resident, faculty, EPA, days ago, resident self-rating, faculty rating)
    let script: [(&Actor, &Actor, &str, i64, EntrustmentLevel, Option<EntrustmentLevel>); 12] = [
        (&ana, &okafor, "EPA-10", 150, DirectSupervision, Some(DirectSupervision)),
        (&ana, &okafor, "EPA-10", 95, IndirectSupervision, Some(IndirectSupervision)),
        (&ana, &lind, "EPA-10", 20, IndirectSupervision, Some(PracticeReady)),
        (&ana, &lind, "EPA-4", 120, IndirectSupervision, Some(IndirectSupervision)),
        (&ana, &okafor, "EPA-4", 12, PracticeReady, Some(PracticeReady)),
        (&ana, &okafor, "EPA-15", 40, PracticeReady, Some(DirectSupervision)),
        (&ana, &lind, "EPA-2", 5, IndirectSupervision, None),
        (&ben, &okafor, "EPA-11", 100, ObservationOnly, Some(ObservationOnly)),
        (&ben, &okafor, "EPA-11", 30, DirectSupervision, Some(DirectSupervision)),
        (&ben, &lind, "EPA-9", 25, DirectSupervision, Some(ObservationOnly)),
        (&ben, &lind, "EPA-1", 8, DirectSupervision, Some(DirectSupervision)),
        (&ben, &okafor, "EPA-18", 2, ObservationOnly, None),
    ];

    let now = Utc::now();
    let mut evaluations = Vec::new();
    for (i, (resident, faculty, code, days_ago, self_rating, faculty_rating)) in
        script.into_iter().enumerate()
    {
        let epa = catalogue
            .by_code(code)
            .with_context(|| format!("{code} missing from built-in catalogue"))?;
        let created_at = now - Duration::days(days_ago);
        let initiator = if i % 2 == 0 { resident } else { faculty };
        let request = NewEvaluation {
            initiated_by: initiator.id,
            resident_id: resident.id,
            faculty_id: faculty.id,
            epa_id: epa.id,
            domains: BTreeSet::from([Domain::Intraop]),
            custom_case_text: None,
            initial_assessment: None,
        };
        let mut evaluation = lifecycle::create(request, resident, faculty, epa, created_at)?;

        let rate = |level| Assessment {
            entrustment_level: level,
            complexity: Complexity::Moderate,
            comment: None,
        };
        lifecycle::submit_party(&mut evaluation, Party::Resident, rate(self_rating), created_at)?;
        if let Some(level) = faculty_rating {
            let rated_at = created_at + Duration::hours(6);
            lifecycle::submit_party(&mut evaluation, Party::Faculty, rate(level), rated_at)?;
        }
        evaluations.push(evaluation);
    }

    Ok(Dataset {
        actors: vec![ana, ben, okafor, lind, admin],
        evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entrust_core::dataset::validate_dataset;

    #[test]
    fn example_dataset_is_valid() {
        let dataset = example_dataset().unwrap();
        assert!(validate_dataset(&dataset, &Catalogue::surgical()).is_empty());
        assert_eq!(dataset.evaluations.len(), 12);
        assert_eq!(
            dataset.evaluations.iter().filter(|e| e.is_completed()).count(),
            10
        );
    }
}
