//! Persistence boundary for actors and evaluations.
//!
//! Implementations must make `insert` and `submit_party` atomic: the check
//! that a party has not yet submitted and the write of their sub-record
//! happen under one lock or transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EvaluationError;
use crate::lifecycle;
use crate::model::{Actor, Assessment, Evaluation, Party, Role};

/// Query filter over stored evaluations. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationFilter {
    #[serde(default)]
    pub institution_id: Option<Uuid>,
    #[serde(default)]
    pub resident_id: Option<Uuid>,
    #[serde(default)]
    pub faculty_id: Option<Uuid>,
    #[serde(default)]
    pub epa_id: Option<Uuid>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl EvaluationFilter {
    pub fn institution(institution_id: Uuid) -> Self {
        Self {
            institution_id: Some(institution_id),
            ..Default::default()
        }
    }

    pub fn resident(resident_id: Uuid) -> Self {
        Self {
            resident_id: Some(resident_id),
            ..Default::default()
        }
    }

    /// Evaluations the actor takes part in, on either side.
    pub fn participant(actor: &Actor) -> Self {
        match actor.role {
            Role::Resident => Self::resident(actor.id),
            Role::Faculty => Self {
                faculty_id: Some(actor.id),
                ..Default::default()
            },
            Role::Admin => Self::institution(actor.institution_id),
        }
    }

    pub fn matches(&self, evaluation: &Evaluation) -> bool {
        self.institution_id.map_or(true, |id| evaluation.institution_id == id)
            && self.resident_id.map_or(true, |id| evaluation.resident_id == id)
            && self.faculty_id.map_or(true, |id| evaluation.faculty_id == id)
            && self.epa_id.map_or(true, |id| evaluation.epa_id == id)
            && self
                .completed
                .map_or(true, |done| evaluation.is_completed() == done)
    }
}

/// Storage collaborator for the evaluation lifecycle.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn actor(&self, id: Uuid) -> Result<Option<Actor>, EvaluationError>;

    async fn insert_actor(&self, actor: Actor) -> Result<(), EvaluationError>;

    /// Atomically store a new evaluation.
    async fn insert(&self, evaluation: Evaluation) -> Result<Evaluation, EvaluationError>;

    async fn get(&self, id: Uuid) -> Result<Option<Evaluation>, EvaluationError>;

    /// Atomically record `party`'s assessment if, and only if, that party has
    /// not submitted yet. Returns the updated record.
    async fn submit_party(
        &self,
        id: Uuid,
        party: Party,
        assessment: Assessment,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvaluationError>;

    /// All evaluations matching `filter`, oldest first.
    async fn query(&self, filter: &EvaluationFilter) -> Result<Vec<Evaluation>, EvaluationError>;
}

#[derive(Debug, Default)]
struct State {
    actors: HashMap<Uuid, Actor>,
    evaluations: HashMap<Uuid, Evaluation>,
}

/// In-process store guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing actors and records.
    pub fn with_records(actors: Vec<Actor>, evaluations: Vec<Evaluation>) -> Self {
        let state = State {
            actors: actors.into_iter().map(|a| (a.id, a)).collect(),
            evaluations: evaluations.into_iter().map(|e| (e.id, e)).collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.evaluations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EvaluationStore for InMemoryStore {
    async fn actor(&self, id: Uuid) -> Result<Option<Actor>, EvaluationError> {
        Ok(self.state.read().await.actors.get(&id).cloned())
    }

    async fn insert_actor(&self, actor: Actor) -> Result<(), EvaluationError> {
        let mut state = self.state.write().await;
        if state.actors.contains_key(&actor.id) {
            return Err(EvaluationError::validation(format!(
                "actor {} already exists",
                actor.id
            )));
        }
        state.actors.insert(actor.id, actor);
        Ok(())
    }

    async fn insert(&self, evaluation: Evaluation) -> Result<Evaluation, EvaluationError> {
        let mut state = self.state.write().await;
        if state.evaluations.contains_key(&evaluation.id) {
            return Err(EvaluationError::validation(format!(
                "evaluation {} already exists",
                evaluation.id
            )));
        }
        state.evaluations.insert(evaluation.id, evaluation.clone());
        Ok(evaluation)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Evaluation>, EvaluationError> {
        Ok(self.state.read().await.evaluations.get(&id).cloned())
    }

    async fn submit_party(
        &self,
        id: Uuid,
        party: Party,
        assessment: Assessment,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvaluationError> {
        let mut state = self.state.write().await;
        let evaluation = state
            .evaluations
            .get_mut(&id)
            .ok_or_else(|| EvaluationError::not_found("evaluation", id))?;
        lifecycle::submit_party(evaluation, party, assessment, now)?;
        Ok(evaluation.clone())
    }

    async fn query(&self, filter: &EvaluationFilter) -> Result<Vec<Evaluation>, EvaluationError> {
        let state = self.state.read().await;
        let mut matched: Vec<Evaluation> = state
            .evaluations
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matched)
    }
}
