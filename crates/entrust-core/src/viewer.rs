//! Viewer-relative classification of evaluations into dashboard buckets.
//!
//! Buckets are recomputed on every read and never stored. For a given
//! (record, viewer) pair exactly one bucket applies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Actor, Evaluation, Role};

/// The dashboard bucket a record falls into for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Completed and visible to the viewer.
    Feed,
    /// Waiting on the viewer to respond.
    Inbox,
    /// Initiated by the viewer and waiting on the counterparty.
    Pending,
    None,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Feed => write!(f, "feed"),
            Bucket::Inbox => write!(f, "inbox"),
            Bucket::Pending => write!(f, "pending"),
            Bucket::None => write!(f, "none"),
        }
    }
}

/// Classify `evaluation` for `viewer`.
///
/// An initiator who has not rated yet while the counterparty already has is
/// neither inbox nor pending; use [`needs_action`] to surface that case.
pub fn classify(evaluation: &Evaluation, viewer: &Actor) -> Bucket {
    let party = evaluation.party_of(viewer.id);

    if evaluation.is_completed() {
        let institution_admin =
            viewer.role == Role::Admin && viewer.institution_id == evaluation.institution_id;
        return if party.is_some() || institution_admin {
            Bucket::Feed
        } else {
            Bucket::None
        };
    }

    let Some(party) = party else {
        return Bucket::None;
    };

    if viewer.id == evaluation.initiated_by {
        if !evaluation.submission(party.counterparty()).is_submitted() {
            Bucket::Pending
        } else {
            Bucket::None
        }
    } else if !evaluation.submission(party).is_submitted() {
        Bucket::Inbox
    } else {
        Bucket::None
    }
}

/// True when the viewer is a party whose own sub-record is still open.
pub fn needs_action(evaluation: &Evaluation, viewer: &Actor) -> bool {
    !evaluation.is_completed()
        && evaluation
            .party_of(viewer.id)
            .is_some_and(|p| !evaluation.submission(p).is_submitted())
}

/// A viewer's dashboard, each list newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Buckets {
    pub feed: Vec<Evaluation>,
    pub inbox: Vec<Evaluation>,
    pub pending: Vec<Evaluation>,
}

impl Buckets {
    pub fn len(&self) -> usize {
        self.feed.len() + self.inbox.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split records into the viewer's feed, inbox and pending lists.
pub fn partition<'a, I>(evaluations: I, viewer: &Actor) -> Buckets
where
    I: IntoIterator<Item = &'a Evaluation>,
{
    let mut buckets = Buckets::default();
    for evaluation in evaluations {
        match classify(evaluation, viewer) {
            Bucket::Feed => buckets.feed.push(evaluation.clone()),
            Bucket::Inbox => buckets.inbox.push(evaluation.clone()),
            Bucket::Pending => buckets.pending.push(evaluation.clone()),
            Bucket::None => {}
        }
    }
    for list in [&mut buckets.feed, &mut buckets.inbox, &mut buckets.pending] {
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Complexity, Domain, Parties, PartySubmission};
    use crate::scale::EntrustmentLevel;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn actor(role: Role, institution_id: Uuid) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            institution_id,
            pgy_year: None,
            name: None,
        }
    }

    fn submitted() -> PartySubmission {
        PartySubmission {
            entrustment_level: Some(EntrustmentLevel::DirectSupervision),
            complexity: Some(Complexity::Moderate),
            comment: None,
            completed_at: Some(Utc::now()),
        }
    }

    fn evaluation(
        resident: &Actor,
        faculty: &Actor,
        initiated_by: Uuid,
        resident_done: bool,
        faculty_done: bool,
    ) -> Evaluation {
        let now = Utc::now();
        Evaluation {
            id: Uuid::new_v4(),
            institution_id: resident.institution_id,
            resident_id: resident.id,
            faculty_id: faculty.id,
            initiated_by,
            epa_id: Uuid::new_v4(),
            domains: BTreeSet::from([Domain::Preop]),
            is_custom: false,
            custom_case_text: None,
            submissions: Parties {
                resident: if resident_done { submitted() } else { PartySubmission::default() },
                faculty: if faculty_done { submitted() } else { PartySubmission::default() },
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn faculty_initiated_and_rated_lands_in_resident_inbox() {
        let inst = Uuid::new_v4();
        let resident = actor(Role::Resident, inst);
        let faculty = actor(Role::Faculty, inst);
        let eval = evaluation(&resident, &faculty, faculty.id, false, true);

        assert_eq!(classify(&eval, &resident), Bucket::Inbox);
        assert_eq!(classify(&eval, &faculty), Bucket::Pending);
    }

    #[test]
    fn completed_records_feed_parties_and_institution_admins() {
        let inst = Uuid::new_v4();
        let resident = actor(Role::Resident, inst);
        let faculty = actor(Role::Faculty, inst);
        let admin = actor(Role::Admin, inst);
        let foreign_admin = actor(Role::Admin, Uuid::new_v4());
        let stranger = actor(Role::Resident, inst);
        let eval = evaluation(&resident, &faculty, resident.id, true, true);

        assert_eq!(classify(&eval, &resident), Bucket::Feed);
        assert_eq!(classify(&eval, &faculty), Bucket::Feed);
        assert_eq!(classify(&eval, &admin), Bucket::Feed);
        assert_eq!(classify(&eval, &foreign_admin), Bucket::None);
        assert_eq!(classify(&eval, &stranger), Bucket::None);
    }

    #[test]
    fn admins_do_not_see_open_records() {
        let inst = Uuid::new_v4();
        let resident = actor(Role::Resident, inst);
        let faculty = actor(Role::Faculty, inst);
        let admin = actor(Role::Admin, inst);
        let eval = evaluation(&resident, &faculty, resident.id, true, false);
        assert_eq!(classify(&eval, &admin), Bucket::None);
    }

    #[test]
    fn initiator_waiting_on_own_rating_is_none_but_needs_action() {
        let inst = Uuid::new_v4();
        let resident = actor(Role::Resident, inst);
        let faculty = actor(Role::Faculty, inst);
        let eval = evaluation(&resident, &faculty, resident.id, false, true);

        assert_eq!(classify(&eval, &resident), Bucket::None);
        assert!(needs_action(&eval, &resident));
        assert_eq!(classify(&eval, &faculty), Bucket::None);
        assert!(!needs_action(&eval, &faculty));
    }

    #[test]
    fn every_combination_yields_exactly_one_bucket() {
        let inst = Uuid::new_v4();
        let resident = actor(Role::Resident, inst);
        let faculty = actor(Role::Faculty, inst);
        let admin = actor(Role::Admin, inst);
        let outsider = actor(Role::Faculty, inst);

        for initiator in [resident.id, faculty.id] {
            for resident_done in [false, true] {
                for faculty_done in [false, true] {
                    let eval =
                        evaluation(&resident, &faculty, initiator, resident_done, faculty_done);
                    for viewer in [&resident, &faculty, &admin, &outsider] {
                        let bucket = classify(&eval, viewer);
                        let flags = [
                            eval.is_completed()
                                && (eval.party_of(viewer.id).is_some()
                                    || viewer.role == Role::Admin),
                            !eval.is_completed()
                                && viewer.id != eval.initiated_by
                                && eval
                                    .party_of(viewer.id)
                                    .is_some_and(|p| !eval.submission(p).is_submitted()),
                            !eval.is_completed()
                                && viewer.id == eval.initiated_by
                                && eval.party_of(viewer.id).is_some_and(|p| {
                                    !eval.submission(p.counterparty()).is_submitted()
                                }),
                        ];
                        assert!(flags.iter().filter(|f| **f).count() <= 1);
                        let expected = match flags {
                            [true, _, _] => Bucket::Feed,
                            [_, true, _] => Bucket::Inbox,
                            [_, _, true] => Bucket::Pending,
                            _ => Bucket::None,
                        };
                        assert_eq!(bucket, expected);
                    }
                }
            }
        }
    }

    #[test]
    fn partition_orders_newest_first() {
        let inst = Uuid::new_v4();
        let resident = actor(Role::Resident, inst);
        let faculty = actor(Role::Faculty, inst);

        let mut older = evaluation(&resident, &faculty, faculty.id, false, true);
        older.created_at = Utc::now() - Duration::days(3);
        let newer = evaluation(&resident, &faculty, faculty.id, false, true);
        let done = evaluation(&resident, &faculty, resident.id, true, true);
        let mine = evaluation(&resident, &faculty, resident.id, true, false);

        let records = vec![older.clone(), done.clone(), newer.clone(), mine.clone()];
        let buckets = partition(&records, &resident);

        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets.feed[0].id, done.id);
        assert_eq!(buckets.pending[0].id, mine.id);
        assert_eq!(
            buckets.inbox.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );
    }
}
