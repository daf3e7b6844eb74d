//! Core data model types for entrust.
//!
//! These are the records the rest of the system works with: catalogue
//! entries, actors, and the two-party evaluation record.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EvaluationError;
use crate::scale::EntrustmentLevel;

/// A catalogued Entrustable Professional Activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epa {
    pub id: Uuid,
    /// Unique short code, e.g. "EPA-4".
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The role an actor was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Resident,
    Faculty,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Resident => write!(f, "resident"),
            Role::Faculty => write!(f, "faculty"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// A resident, faculty member or institution admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub institution_id: Uuid,
    /// Training year, residents only.
    #[serde(default)]
    pub pgy_year: Option<u8>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Actor {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Perioperative phase covered by an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Preop,
    Intraop,
    Postop,
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preop" => Ok(Domain::Preop),
            "intraop" => Ok(Domain::Intraop),
            "postop" => Ok(Domain::Postop),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// Case complexity as judged by one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Straightforward,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Straightforward => write!(f, "straightforward"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "straightforward" => Ok(Complexity::Straightforward),
            "moderate" => Ok(Complexity::Moderate),
            "complex" => Ok(Complexity::Complex),
            other => Err(format!("unknown complexity: {other}")),
        }
    }
}

/// One of the two sides of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Resident,
    Faculty,
}

impl Party {
    pub fn counterparty(self) -> Party {
        match self {
            Party::Resident => Party::Faculty,
            Party::Faculty => Party::Resident,
        }
    }

    /// The actor role that may act as this party.
    pub fn role(self) -> Role {
        match self {
            Party::Resident => Role::Resident,
            Party::Faculty => Role::Faculty,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Resident => write!(f, "resident"),
            Party::Faculty => write!(f, "faculty"),
        }
    }
}

/// A complete assessment submitted by one party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub entrustment_level: EntrustmentLevel,
    pub complexity: Complexity,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Assessment {
    /// Build an assessment from raw wire strings.
    ///
    /// Unknown level or complexity values are a validation error. Blank
    /// comments are dropped.
    pub fn parse(
        entrustment_level: &str,
        complexity: &str,
        comment: Option<&str>,
    ) -> Result<Self, EvaluationError> {
        let entrustment_level = entrustment_level
            .parse::<EntrustmentLevel>()
            .map_err(EvaluationError::Validation)?;
        let complexity = complexity
            .parse::<Complexity>()
            .map_err(EvaluationError::Validation)?;
        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Self {
            entrustment_level,
            complexity,
            comment,
        })
    }
}

/// One party's sub-record on an evaluation.
///
/// Either everything is unset, or `completed_at` is set together with the
/// assessment fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartySubmission {
    #[serde(default)]
    pub entrustment_level: Option<EntrustmentLevel>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PartySubmission {
    pub fn submitted(assessment: Assessment, at: DateTime<Utc>) -> Self {
        Self {
            entrustment_level: Some(assessment.entrustment_level),
            complexity: Some(assessment.complexity),
            comment: assessment.comment,
            completed_at: Some(at),
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.completed_at.is_some()
    }

    /// True when assessment fields are present without a completion stamp.
    pub fn is_half_submitted(&self) -> bool {
        self.completed_at.is_none()
            && (self.entrustment_level.is_some()
                || self.complexity.is_some()
                || self.comment.is_some())
    }
}

/// The resident and faculty sub-records of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parties {
    pub resident: PartySubmission,
    pub faculty: PartySubmission,
}

impl Parties {
    pub fn get(&self, party: Party) -> &PartySubmission {
        match party {
            Party::Resident => &self.resident,
            Party::Faculty => &self.faculty,
        }
    }

    pub fn get_mut(&mut self, party: Party) -> &mut PartySubmission {
        match party {
            Party::Resident => &mut self.resident,
            Party::Faculty => &mut self.faculty,
        }
    }
}

/// A two-party evaluation of a resident against one EPA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub resident_id: Uuid,
    pub faculty_id: Uuid,
    /// Always one of `resident_id` or `faculty_id`.
    pub initiated_by: Uuid,
    pub epa_id: Uuid,
    pub domains: BTreeSet<Domain>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub custom_case_text: Option<String>,
    #[serde(default)]
    pub submissions: Parties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Derived from the two completion stamps; never stored.
    pub fn is_completed(&self) -> bool {
        self.submissions.resident.is_submitted() && self.submissions.faculty.is_submitted()
    }

    pub fn party_id(&self, party: Party) -> Uuid {
        match party {
            Party::Resident => self.resident_id,
            Party::Faculty => self.faculty_id,
        }
    }

    /// Which side of this evaluation `actor_id` is on, if any.
    pub fn party_of(&self, actor_id: Uuid) -> Option<Party> {
        if actor_id == self.resident_id {
            Some(Party::Resident)
        } else if actor_id == self.faculty_id {
            Some(Party::Faculty)
        } else {
            None
        }
    }

    pub fn initiator(&self) -> Option<Party> {
        self.party_of(self.initiated_by)
    }

    pub fn submission(&self, party: Party) -> &PartySubmission {
        self.submissions.get(party)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assessment_rejects_unknown_values() {
        let ok = Assessment::parse("practice_ready", "complex", Some("  great case ")).unwrap();
        assert_eq!(ok.entrustment_level, EntrustmentLevel::PracticeReady);
        assert_eq!(ok.complexity, Complexity::Complex);
        assert_eq!(ok.comment.as_deref(), Some("great case"));

        let blank = Assessment::parse("direct_supervision", "moderate", Some("   ")).unwrap();
        assert!(blank.comment.is_none());

        assert!(matches!(
            Assessment::parse("4", "moderate", None),
            Err(EvaluationError::Validation(_))
        ));
        assert!(matches!(
            Assessment::parse("practice_ready", "hard", None),
            Err(EvaluationError::Validation(_))
        ));
    }

    #[test]
    fn party_lookup_is_symmetric() {
        let resident = Uuid::new_v4();
        let faculty = Uuid::new_v4();
        let now = Utc::now();
        let eval = Evaluation {
            id: Uuid::new_v4(),
            institution_id: Uuid::new_v4(),
            resident_id: resident,
            faculty_id: faculty,
            initiated_by: faculty,
            epa_id: Uuid::new_v4(),
            domains: BTreeSet::from([Domain::Intraop]),
            is_custom: false,
            custom_case_text: None,
            submissions: Parties::default(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(eval.party_of(resident), Some(Party::Resident));
        assert_eq!(eval.party_of(faculty), Some(Party::Faculty));
        assert_eq!(eval.party_of(Uuid::new_v4()), None);
        assert_eq!(eval.initiator(), Some(Party::Faculty));
        assert_eq!(Party::Faculty.counterparty(), Party::Resident);
        assert!(!eval.is_completed());
    }

    #[test]
    fn half_submitted_detection() {
        let mut sub = PartySubmission::default();
        assert!(!sub.is_half_submitted());
        sub.comment = Some("draft".into());
        assert!(sub.is_half_submitted());
        sub.completed_at = Some(Utc::now());
        assert!(!sub.is_half_submitted());
    }

    #[test]
    fn domain_and_complexity_parse() {
        assert_eq!("PreOp".parse::<Domain>().unwrap(), Domain::Preop);
        assert!("surgery".parse::<Domain>().is_err());
        assert_eq!("moderate".parse::<Complexity>().unwrap(), Complexity::Moderate);
        assert_eq!(Complexity::Straightforward.to_string(), "straightforward");
    }
}
