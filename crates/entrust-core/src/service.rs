//! Evaluation service.
//!
//! Wires the store, the EPA catalogue and an optional case classifier into
//! the operations callers actually use: create, submit, dashboard buckets
//! and competency profiles.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{competency_profile, CompetencyProfile, TimeRange};
use crate::catalogue::Catalogue;
use crate::error::{ClassifierError, EvaluationError};
use crate::lifecycle::{self, NewEvaluation};
use crate::model::{Actor, Assessment, Domain, Evaluation, Role};
use crate::store::{EvaluationFilter, EvaluationStore};
use crate::traits::{CaseClassifier, Classification, ClassificationRequest};
use crate::viewer::{partition, Buckets};

/// Configuration for the evaluation service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Classifications below this confidence are rejected.
    pub min_confidence: f64,
    /// Retries on transient classifier errors.
    pub max_retries: u32,
    /// Initial delay between retries, doubled each attempt.
    pub retry_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// A free-text case to be mapped to an EPA before the record is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCase {
    pub initiated_by: Uuid,
    pub resident_id: Uuid,
    pub faculty_id: Uuid,
    pub case_text: String,
    pub domains: BTreeSet<Domain>,
    #[serde(default)]
    pub initial_assessment: Option<Assessment>,
}

/// The evaluation service.
pub struct EvaluationService {
    store: Arc<dyn EvaluationStore>,
    catalogue: Catalogue,
    classifier: Option<Arc<dyn CaseClassifier>>,
    config: ServiceConfig,
}

impl EvaluationService {
    pub fn new(store: Arc<dyn EvaluationStore>, catalogue: Catalogue, config: ServiceConfig) -> Self {
        Self {
            store,
            catalogue,
            classifier: None,
            config,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn CaseClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    async fn resolve_actor(&self, id: Uuid) -> Result<Actor, EvaluationError> {
        self.store
            .actor(id)
            .await?
            .ok_or_else(|| EvaluationError::not_found("actor", id))
    }

    /// Create an evaluation against a catalogued EPA.
    #[tracing::instrument(skip_all, fields(resident = %request.resident_id, faculty = %request.faculty_id))]
    pub async fn create(&self, request: NewEvaluation) -> Result<Evaluation, EvaluationError> {
        let epa = self
            .catalogue
            .get(request.epa_id)
            .ok_or_else(|| EvaluationError::not_found("epa", request.epa_id))?;
        let (resident, faculty) = futures::try_join!(
            self.resolve_actor(request.resident_id),
            self.resolve_actor(request.faculty_id)
        )?;

        let evaluation = lifecycle::create(request, &resident, &faculty, epa, Utc::now())?;
        let stored = self.store.insert(evaluation).await?;
        tracing::info!(evaluation = %stored.id, epa = %epa.code, "evaluation created");
        Ok(stored)
    }

    /// Map a free-text case to an EPA and create the evaluation.
    ///
    /// Low-confidence or unresolvable classifications are rejected and
    /// nothing is written.
    #[tracing::instrument(skip_all, fields(resident = %case.resident_id, faculty = %case.faculty_id))]
    pub async fn create_custom_case(
        &self,
        case: CustomCase,
    ) -> Result<(Evaluation, Classification), EvaluationError> {
        let classification = self.classify_case(&case.case_text).await?;

        let request = NewEvaluation {
            initiated_by: case.initiated_by,
            resident_id: case.resident_id,
            faculty_id: case.faculty_id,
            epa_id: classification.epa_id,
            domains: case.domains,
            custom_case_text: Some(case.case_text),
            initial_assessment: case.initial_assessment,
        };
        let evaluation = self.create(request).await?;
        Ok((evaluation, classification))
    }

    /// Ask the classifier which EPA a case belongs to.
    pub async fn classify_case(&self, case_text: &str) -> Result<Classification, EvaluationError> {
        let case_text = case_text.trim();
        if case_text.is_empty() {
            return Err(EvaluationError::validation("case description is empty"));
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| EvaluationError::validation("no case classifier configured"))?;

        let request = ClassificationRequest {
            case_text: case_text.to_string(),
            candidates: self.catalogue.epas.clone(),
        };
        let classification = match self.classify_with_retry(classifier.as_ref(), &request).await {
            Ok(classification) => classification,
            Err(ClassifierError::NoMatch(reason)) => {
                return Err(EvaluationError::validation(format!(
                    "case matched no EPA: {reason}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let Some(epa) = self.catalogue.get(classification.epa_id) else {
            return Err(EvaluationError::validation(format!(
                "classifier chose unknown EPA {}",
                classification.epa_id
            )));
        };
        if !(0.0..=1.0).contains(&classification.confidence)
            || classification.confidence < self.config.min_confidence
        {
            return Err(EvaluationError::validation(format!(
                "classification confidence {:.2} for {} is below {:.2}",
                classification.confidence, epa.code, self.config.min_confidence
            )));
        }

        tracing::info!(
            classifier = classifier.name(),
            epa = %epa.code,
            confidence = classification.confidence,
            "case classified"
        );
        Ok(classification)
    }

    async fn classify_with_retry(
        &self,
        classifier: &dyn CaseClassifier,
        request: &ClassificationRequest,
    ) -> Result<Classification, ClassifierError> {
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;
        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(Duration::from_secs(60));
            }
            match classifier.classify(request).await {
                Ok(classification) => return Ok(classification),
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) => {
                    tracing::warn!(classifier = classifier.name(), attempt = retry + 1, "classification failed: {e}");
                    if let Some(ms) = e.retry_after_ms() {
                        retry_delay = Duration::from_millis(ms);
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ClassifierError::NetworkError("no attempts made".into())))
    }

    /// Record `actor_id`'s assessment on an evaluation.
    #[tracing::instrument(skip(self, assessment))]
    pub async fn submit(
        &self,
        evaluation_id: Uuid,
        actor_id: Uuid,
        assessment: Assessment,
    ) -> Result<Evaluation, EvaluationError> {
        let evaluation = self
            .store
            .get(evaluation_id)
            .await?
            .ok_or_else(|| EvaluationError::not_found("evaluation", evaluation_id))?;
        let party = evaluation.party_of(actor_id).ok_or_else(|| {
            EvaluationError::validation(format!(
                "{actor_id} is not a party to evaluation {evaluation_id}"
            ))
        })?;

        let updated = self
            .store
            .submit_party(evaluation_id, party, assessment, Utc::now())
            .await?;
        if updated.is_completed() {
            tracing::info!(evaluation = %evaluation_id, "evaluation completed");
        }
        Ok(updated)
    }

    /// The viewer's feed, inbox and pending lists.
    pub async fn buckets_for(&self, viewer_id: Uuid) -> Result<Buckets, EvaluationError> {
        let viewer = self.resolve_actor(viewer_id).await?;
        let records = self
            .store
            .query(&EvaluationFilter::participant(&viewer))
            .await?;
        Ok(partition(&records, &viewer))
    }

    /// A resident's competency profile over `range`, ending at `now`.
    pub async fn profile_for(
        &self,
        resident_id: Uuid,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<CompetencyProfile, EvaluationError> {
        let resident = self.resolve_actor(resident_id).await?;
        if resident.role != Role::Resident {
            return Err(EvaluationError::validation(format!(
                "{resident_id} is not a resident"
            )));
        }
        let filter = EvaluationFilter {
            resident_id: Some(resident_id),
            completed: Some(true),
            ..Default::default()
        };
        let records = self.store.query(&filter).await?;
        Ok(competency_profile(
            resident_id,
            &records,
            &self.catalogue,
            range.window(now),
        ))
    }
}
