//! Evaluation lifecycle state machine.
//!
//! `Created -> AwaitingCounterparty -> Completed`. The state is derived from
//! the two completion stamps, and no transition clears a stamp, so a record
//! only ever moves forward.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EvaluationError;
use crate::model::{
    Actor, Assessment, Domain, Epa, Evaluation, Parties, Party, PartySubmission, Role,
};

/// Where an evaluation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Neither party has submitted.
    Created,
    /// Exactly one party has submitted.
    AwaitingCounterparty,
    /// Both parties have submitted. Terminal.
    Completed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Created => write!(f, "created"),
            LifecycleState::AwaitingCounterparty => write!(f, "awaiting_counterparty"),
            LifecycleState::Completed => write!(f, "completed"),
        }
    }
}

/// Derive the lifecycle state of a record.
pub fn state(evaluation: &Evaluation) -> LifecycleState {
    let submitted = [Party::Resident, Party::Faculty]
        .into_iter()
        .filter(|p| evaluation.submission(*p).is_submitted())
        .count();
    match submitted {
        0 => LifecycleState::Created,
        1 => LifecycleState::AwaitingCounterparty,
        _ => LifecycleState::Completed,
    }
}

/// Input for creating an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvaluation {
    /// The actor creating the record; must be the resident or the faculty.
    pub initiated_by: Uuid,
    pub resident_id: Uuid,
    pub faculty_id: Uuid,
    pub epa_id: Uuid,
    pub domains: BTreeSet<Domain>,
    #[serde(default)]
    pub custom_case_text: Option<String>,
    /// The initiator's own assessment, if they rate at creation time.
    #[serde(default)]
    pub initial_assessment: Option<Assessment>,
}

/// Validate a creation request against the resolved parties and EPA and
/// build the record.
///
/// Nothing here touches storage; a returned error means nothing was written.
pub fn create(
    request: NewEvaluation,
    resident: &Actor,
    faculty: &Actor,
    epa: &Epa,
    now: DateTime<Utc>,
) -> Result<Evaluation, EvaluationError> {
    if resident.id != request.resident_id || resident.role != Role::Resident {
        return Err(EvaluationError::validation(format!(
            "{} is not a resident",
            request.resident_id
        )));
    }
    if faculty.id != request.faculty_id || faculty.role != Role::Faculty {
        return Err(EvaluationError::validation(format!(
            "{} is not a faculty member",
            request.faculty_id
        )));
    }
    if resident.institution_id != faculty.institution_id {
        return Err(EvaluationError::validation(
            "resident and faculty belong to different institutions",
        ));
    }
    if epa.id != request.epa_id {
        return Err(EvaluationError::not_found("epa", request.epa_id));
    }

    let initiator = if request.initiated_by == request.resident_id {
        Party::Resident
    } else if request.initiated_by == request.faculty_id {
        Party::Faculty
    } else {
        return Err(EvaluationError::validation(format!(
            "initiator {} is not a party to the evaluation",
            request.initiated_by
        )));
    };

    if request.domains.is_empty() {
        return Err(EvaluationError::validation(
            "at least one domain is required",
        ));
    }

    let custom_case_text = request
        .custom_case_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let mut submissions = Parties::default();
    if let Some(assessment) = request.initial_assessment {
        *submissions.get_mut(initiator) = PartySubmission::submitted(assessment, now);
    }

    Ok(Evaluation {
        id: Uuid::new_v4(),
        institution_id: resident.institution_id,
        resident_id: request.resident_id,
        faculty_id: request.faculty_id,
        initiated_by: request.initiated_by,
        epa_id: request.epa_id,
        domains: request.domains,
        is_custom: custom_case_text.is_some(),
        custom_case_text,
        submissions,
        created_at: now,
        updated_at: now,
    })
}

/// Record one party's assessment.
///
/// Fails with `AlreadySubmitted` if that party's sub-record is already
/// complete; the record is left untouched in that case.
pub fn submit_party(
    evaluation: &mut Evaluation,
    party: Party,
    assessment: Assessment,
    now: DateTime<Utc>,
) -> Result<LifecycleState, EvaluationError> {
    if evaluation.submission(party).is_submitted() {
        return Err(EvaluationError::AlreadySubmitted {
            evaluation_id: evaluation.id,
            party,
        });
    }

    *evaluation.submissions.get_mut(party) = PartySubmission::submitted(assessment, now);
    evaluation.updated_at = now;

    let next = state(evaluation);
    tracing::debug!(evaluation = %evaluation.id, %party, state = %next, "party submitted");
    Ok(next)
}
