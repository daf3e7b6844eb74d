//! Dataset files: actors plus evaluation records, loaded from JSON.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalogue::Catalogue;
use crate::model::{Actor, Evaluation, Party, Role};
use crate::store::InMemoryStore;

/// Everything needed to rebuild a store offline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

impl Dataset {
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dataset JSON: {}", path.display()))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize dataset")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write dataset to {}", path.display()))?;
        Ok(())
    }

    pub fn actor(&self, id: Uuid) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// Look an actor up by id or, failing that, by exact name.
    pub fn find_actor(&self, key: &str) -> Option<&Actor> {
        match key.parse::<Uuid>() {
            Ok(id) => self.actor(id),
            Err(_) => self
                .actors
                .iter()
                .find(|a| a.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(key))),
        }
    }

    pub fn residents(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().filter(|a| a.role == Role::Resident)
    }

    /// Move the dataset into an in-memory store.
    pub fn into_store(self) -> InMemoryStore {
        InMemoryStore::with_records(self.actors, self.evaluations)
    }
}

/// A problem found in a dataset. Loading still succeeds.
#[derive(Debug, Clone)]
pub struct DatasetWarning {
    pub evaluation_id: Option<Uuid>,
    pub message: String,
}

impl DatasetWarning {
    fn record(evaluation_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            evaluation_id: Some(evaluation_id),
            message: message.into(),
        }
    }
}

/// Check every record against the lifecycle invariants and its references.
pub fn validate_dataset(dataset: &Dataset, catalogue: &Catalogue) -> Vec<DatasetWarning> {
    let mut warnings = Vec::new();

    let mut actors: HashMap<Uuid, &Actor> = HashMap::new();
    for actor in &dataset.actors {
        if actors.insert(actor.id, actor).is_some() {
            warnings.push(DatasetWarning {
                evaluation_id: None,
                message: format!("duplicate actor id: {}", actor.id),
            });
        }
        match (actor.role, actor.pgy_year) {
            (Role::Resident, Some(0)) => warnings.push(DatasetWarning {
                evaluation_id: None,
                message: format!("resident {} has training year 0", actor.display_name()),
            }),
            (Role::Faculty | Role::Admin, Some(year)) => warnings.push(DatasetWarning {
                evaluation_id: None,
                message: format!(
                    "{} {} has a training year ({year}), only residents do",
                    actor.role,
                    actor.display_name()
                ),
            }),
            _ => {}
        }
    }

    let mut seen = HashSet::new();
    for e in &dataset.evaluations {
        if !seen.insert(e.id) {
            warnings.push(DatasetWarning::record(e.id, "duplicate evaluation id"));
        }
        if e.party_of(e.initiated_by).is_none() {
            warnings.push(DatasetWarning::record(
                e.id,
                format!("initiator {} is neither the resident nor the faculty", e.initiated_by),
            ));
        }
        if e.domains.is_empty() {
            warnings.push(DatasetWarning::record(e.id, "no domains recorded"));
        }
        if catalogue.get(e.epa_id).is_none() {
            warnings.push(DatasetWarning::record(
                e.id,
                format!("EPA {} is not in catalogue '{}'", e.epa_id, catalogue.name),
            ));
        }

        for party in [Party::Resident, Party::Faculty] {
            if e.submission(party).is_half_submitted() {
                warnings.push(DatasetWarning::record(
                    e.id,
                    format!("{party} assessment fields set without a completion time"),
                ));
            }

            let party_id = e.party_id(party);
            match actors.get(&party_id) {
                None => warnings.push(DatasetWarning::record(
                    e.id,
                    format!("{party} {party_id} is not a known actor"),
                )),
                Some(actor) if actor.role != party.role() => {
                    warnings.push(DatasetWarning::record(
                        e.id,
                        format!("{party} {party_id} has role {}", actor.role),
                    ))
                }
                Some(actor) if actor.institution_id != e.institution_id => {
                    warnings.push(DatasetWarning::record(
                        e.id,
                        format!("{party} {party_id} belongs to another institution"),
                    ))
                }
                Some(_) => {}
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Domain, Parties, PartySubmission};
    use crate::scale::EntrustmentLevel;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn actor(role: Role, institution_id: Uuid, name: &str) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            institution_id,
            pgy_year: None,
            name: Some(name.into()),
        }
    }

    fn dataset() -> (Dataset, Catalogue) {
        let catalogue = Catalogue::surgical();
        let institution = Uuid::new_v4();
        let resident = actor(Role::Resident, institution, "Ana");
        let faculty = actor(Role::Faculty, institution, "Dr. Okafor");
        let now = Utc::now();
        let evaluation = Evaluation {
            id: Uuid::new_v4(),
            institution_id: institution,
            resident_id: resident.id,
            faculty_id: faculty.id,
            initiated_by: resident.id,
            epa_id: catalogue.by_code("EPA-2").unwrap().id,
            domains: BTreeSet::from([Domain::Preop]),
            is_custom: false,
            custom_case_text: None,
            submissions: Parties::default(),
            created_at: now,
            updated_at: now,
        };
        (
            Dataset {
                actors: vec![resident, faculty],
                evaluations: vec![evaluation],
            },
            catalogue,
        )
    }

    #[test]
    fn clean_dataset_has_no_warnings() {
        let (data, catalogue) = dataset();
        assert!(validate_dataset(&data, &catalogue).is_empty());
    }

    #[test]
    fn invariant_violations_are_reported() {
        let (mut data, catalogue) = dataset();
        let e = &mut data.evaluations[0];
        e.initiated_by = Uuid::new_v4();
        e.domains.clear();
        e.submissions.faculty = PartySubmission {
            entrustment_level: Some(EntrustmentLevel::PracticeReady),
            ..Default::default()
        };
        let messages: Vec<String> = validate_dataset(&data, &catalogue)
            .into_iter()
            .map(|w| w.message)
            .collect();
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages.iter().any(|m| m.contains("initiator")));
        assert!(messages.iter().any(|m| m.contains("no domains")));
        assert!(messages.iter().any(|m| m.contains("faculty assessment fields")));
    }

    #[test]
    fn reference_problems_are_reported() {
        let (mut data, catalogue) = dataset();
        data.actors[1].role = Role::Admin;
        data.actors[0].institution_id = Uuid::new_v4();
        data.evaluations[0].epa_id = Uuid::new_v4();
        let warnings = validate_dataset(&data, &catalogue);
        assert!(warnings.iter().any(|w| w.message.contains("has role admin")));
        assert!(warnings.iter().any(|w| w.message.contains("another institution")));
        assert!(warnings.iter().any(|w| w.message.contains("not in catalogue")));
    }

    #[test]
    fn training_year_only_on_residents() {
        let (mut data, catalogue) = dataset();
        data.actors[0].pgy_year = Some(3);
        assert!(validate_dataset(&data, &catalogue).is_empty());

        data.actors[0].pgy_year = Some(0);
        data.actors[1].pgy_year = Some(2);
        let mut admin = actor(Role::Admin, data.actors[0].institution_id, "Office");
        admin.pgy_year = Some(1);
        data.actors.push(admin);

        let messages: Vec<String> = validate_dataset(&data, &catalogue)
            .into_iter()
            .map(|w| w.message)
            .collect();
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages.iter().any(|m| m.contains("resident Ana has training year 0")));
        assert!(messages.iter().any(|m| m.starts_with("faculty Dr. Okafor has a training year")));
        assert!(messages.iter().any(|m| m.starts_with("admin Office has a training year")));
    }

    #[test]
    fn find_actor_by_id_or_name() {
        let (data, _) = dataset();
        let ana = &data.actors[0];
        assert_eq!(data.find_actor(&ana.id.to_string()), Some(ana));
        assert_eq!(data.find_actor("ana"), Some(ana));
        assert!(data.find_actor("nobody").is_none());
        assert_eq!(data.residents().count(), 1);
    }

    #[test]
    fn json_roundtrip() {
        let (data, _) = dataset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        data.save_json(&path).unwrap();
        let loaded = Dataset::load_json(&path).unwrap();
        assert_eq!(loaded.evaluations, data.evaluations);
        assert_eq!(loaded.actors.len(), 2);
    }

    #[tokio::test]
    async fn into_store_keeps_records() {
        use crate::store::EvaluationStore;
        let (data, _) = dataset();
        let id = data.evaluations[0].id;
        let store = data.into_store();
        assert!(store.get(id).await.unwrap().is_some());
    }
}
