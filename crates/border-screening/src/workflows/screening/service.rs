use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ScreeningConfig;

use super::access::{AccessContext, AccessDenied, Permission, PermissionRegistry};
use super::domain::{ResponseId, SessionId};
use super::questions::{QuestionSet, Section};
use super::repository::{
    AssessmentRecord, AttachmentDescriptor, RepositoryError, ResponseRecord, ResponseRepository,
    ResponseSummary, StoredAttachment,
};
use super::scoring::{
    score_breakdown, ApplicantFlag, FlagSet, OfficerCriterion, ScoreBreakdown, ScoreResult,
};
use super::wizard::{
    finalize, merge_fields, read_assessment, FieldValue, SessionStoreError, StagedUpload,
    StagingError, SubmittedValue, UploadPayload, UploadStaging, ValidationErrors, WizardAction,
    WizardSessionStore, WizardState, WizardStep,
};

/// One wizard step as posted by a client.
#[derive(Debug, Clone, Default)]
pub struct StepSubmission {
    pub current_step: u32,
    pub action: WizardAction,
    pub fields: BTreeMap<String, SubmittedValue>,
    pub uploads: Vec<UploadPayload>,
    pub clear_uploads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    InProgress { step: WizardStep },
    Submitted(Box<ResponseRecord>),
    /// Finalization failed; the wizard returns to `step` with its state kept.
    Rejected {
        step: WizardStep,
        errors: ValidationErrors,
    },
}

/// Current wizard position and accumulated input for a session.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub session_id: SessionId,
    pub step: WizardStep,
    pub total_steps: u8,
    pub fields: BTreeMap<String, FieldValue>,
    pub uploads: Vec<StagedUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsePage {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub responses: Vec<ResponseSummary>,
}

/// Records whose tier changed during a bulk recalculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationSummary {
    pub responses_updated: usize,
    pub assessments_updated: usize,
    pub total: usize,
}

/// Ad-hoc score of flag names on both scales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub applicant: ScoreBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub officer: Option<ScoreBreakdown>,
    pub authoritative: ScoreResult,
}

/// Score applicant and officer flag names. Unknown names are ignored; the officer scale is
/// authoritative whenever any officer name is given.
pub fn score_flags<A, O>(applicant: A, officer: O) -> ScoreReport
where
    A: IntoIterator,
    A::Item: AsRef<str>,
    O: IntoIterator,
    O::Item: AsRef<str>,
{
    let applicant = score_breakdown(&FlagSet::<ApplicantFlag>::from_keys(applicant));
    let officer_keys: Vec<O::Item> = officer.into_iter().collect();
    let officer = if officer_keys.is_empty() {
        None
    } else {
        Some(score_breakdown(&FlagSet::<OfficerCriterion>::from_keys(
            officer_keys,
        )))
    };
    let authoritative = officer
        .as_ref()
        .map(|breakdown| breakdown.result)
        .unwrap_or(applicant.result);

    ScoreReport {
        applicant,
        officer,
        authoritative,
    }
}

/// Service composing the wizard, the record store and access control.
pub struct ScreeningService<R, W, U> {
    repository: Arc<R>,
    sessions: Arc<W>,
    staging: Arc<U>,
    questions: Arc<QuestionSet>,
    permissions: Arc<PermissionRegistry>,
    config: ScreeningConfig,
}

impl<R, W, U> ScreeningService<R, W, U>
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    pub fn new(
        repository: Arc<R>,
        sessions: Arc<W>,
        staging: Arc<U>,
        config: ScreeningConfig,
    ) -> Self {
        Self::with_registry(
            repository,
            sessions,
            staging,
            PermissionRegistry::standard(),
            config,
        )
    }

    pub fn with_registry(
        repository: Arc<R>,
        sessions: Arc<W>,
        staging: Arc<U>,
        permissions: PermissionRegistry,
        config: ScreeningConfig,
    ) -> Self {
        Self {
            repository,
            sessions,
            staging,
            questions: Arc::new(QuestionSet::standard()),
            permissions: Arc::new(permissions),
            config,
        }
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// Current wizard view; a fresh session starts at step 1.
    pub fn wizard(
        &self,
        context: &AccessContext,
        session: &SessionId,
    ) -> Result<WizardView, ScreeningServiceError> {
        self.permissions
            .require(context, Permission::SubmitResponse)?;
        let state = self.sessions.load(session)?.unwrap_or_default();

        Ok(WizardView {
            session_id: session.clone(),
            step: state.step,
            total_steps: self.questions.total_steps(),
            fields: state.fields,
            uploads: state.uploads.into_values().collect(),
        })
    }

    /// Merge one step into the session's wizard and navigate or submit.
    pub fn apply_step(
        &self,
        context: &AccessContext,
        session: &SessionId,
        submission: StepSubmission,
    ) -> Result<StepOutcome, ScreeningServiceError> {
        self.permissions
            .require(context, Permission::SubmitResponse)?;

        let StepSubmission {
            current_step,
            action,
            fields,
            uploads,
            clear_uploads,
        } = submission;

        let total_steps = self.questions.total_steps();
        let step = WizardStep::clamped(current_step, total_steps);
        let mut state = self.sessions.load(session)?.unwrap_or_default();

        let staged = self.stage_uploads(session, uploads)?;
        let fresh = staged.clone();
        let changes = state.apply_step(&self.questions, step, fields, staged, &clear_uploads);
        if !changes.ignored.is_empty() {
            debug!(session = %session, ignored = ?changes.ignored, "dropped undeclared input");
        }
        let live = staging_keys(&state);

        let outcome = match action {
            WizardAction::Previous => {
                state.step = step.previous();
                self.advance(session, state)
            }
            WizardAction::Next => {
                state.step = step.next(total_steps);
                self.advance(session, state)
            }
            WizardAction::Submit => self.submit(context, session, state, step),
        };
        // Until the new state is persisted the previous one still references displaced uploads.
        match &outcome {
            Ok(StepOutcome::Submitted(_)) => {}
            Ok(_) => self.discard_unreferenced(&live, changes.displaced),
            Err(_) => self.discard_unreferenced(&BTreeSet::new(), fresh),
        }
        outcome
    }

    pub fn list(
        &self,
        context: &AccessContext,
        page: usize,
    ) -> Result<ResponsePage, ScreeningServiceError> {
        self.permissions.require(context, Permission::ViewResponses)?;

        let page = page.max(1);
        let page_size = self.config.responses_page_size.max(1);
        let offset = (page - 1).saturating_mul(page_size);
        let total = self.repository.count()?;
        let responses = self
            .repository
            .list(offset, page_size)?
            .iter()
            .map(ResponseRecord::summary)
            .collect();

        Ok(ResponsePage {
            page,
            page_size,
            total,
            responses,
        })
    }

    pub fn get(
        &self,
        context: &AccessContext,
        id: &ResponseId,
    ) -> Result<ResponseRecord, ScreeningServiceError> {
        self.permissions.require(context, Permission::ViewResponses)?;
        self.fetch(id)
    }

    pub fn delete(
        &self,
        context: &AccessContext,
        id: &ResponseId,
    ) -> Result<(), ScreeningServiceError> {
        self.permissions
            .require(context, Permission::DeleteResponse)?;
        self.repository.delete(id)?;
        info!(response = %id, "screening response deleted");
        Ok(())
    }

    pub fn attachment(
        &self,
        context: &AccessContext,
        id: &ResponseId,
        field: &str,
    ) -> Result<StoredAttachment, ScreeningServiceError> {
        self.permissions.require(context, Permission::ViewResponses)?;
        let attachment = self
            .repository
            .attachment(id, field)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(attachment)
    }

    /// Create or replace the officer assessment of a response. The officer score becomes the
    /// response's score.
    pub fn assess(
        &self,
        context: &AccessContext,
        id: &ResponseId,
        fields: BTreeMap<String, SubmittedValue>,
    ) -> Result<ResponseRecord, ScreeningServiceError> {
        self.permissions
            .require(context, Permission::AssessResponse)?;
        let mut record = self.fetch(id)?;

        let mut values = BTreeMap::new();
        let changes = merge_fields(&self.questions, &mut values, fields, |spec| {
            spec.section == Section::Officer
        });
        if !changes.ignored.is_empty() {
            debug!(response = %id, ignored = ?changes.ignored, "dropped undeclared input");
        }
        values.retain(|name, _| self.questions.is_officer_field(name));

        let assessment = read_assessment(&self.questions, &values)?;
        let score = super::scoring::score(&assessment.flags());
        let assessed_at = record
            .assessment
            .as_ref()
            .map(|existing| existing.assessed_at)
            .unwrap_or_else(Utc::now);

        record.assessment = Some(AssessmentRecord {
            assessment,
            score,
            assessed_by: context.user_id,
            assessed_at,
        });
        record.apply_authoritative_score();
        self.repository.update(record.clone())?;

        info!(
            response = %id,
            total_score = record.total_score,
            tier = record.tier.label(),
            "officer assessment saved"
        );
        Ok(record)
    }

    /// Score flag names on behalf of an officer; nothing is stored.
    pub fn score(
        &self,
        context: &AccessContext,
        applicant: &[String],
        officer: &[String],
    ) -> Result<ScoreReport, ScreeningServiceError> {
        self.permissions.require(context, Permission::ViewResponses)?;
        Ok(score_flags(applicant, officer))
    }

    /// Recompute every stored score from its flags.
    pub fn recalculate(
        &self,
        context: &AccessContext,
    ) -> Result<RecalculationSummary, ScreeningServiceError> {
        self.permissions
            .require(context, Permission::RecalculateScores)?;

        let total = self.repository.count()?;
        let mut summary = RecalculationSummary {
            total,
            ..RecalculationSummary::default()
        };

        for mut record in self.repository.list(0, total)? {
            let before = record.clone();
            let (response_changed, assessment_changed) = record.rescore();
            if response_changed {
                summary.responses_updated += 1;
            }
            if assessment_changed {
                summary.assessments_updated += 1;
            }
            if record != before {
                self.repository.update(record)?;
            }
        }

        info!(
            total = summary.total,
            responses_updated = summary.responses_updated,
            assessments_updated = summary.assessments_updated,
            "scores recalculated"
        );
        Ok(summary)
    }

    fn fetch(&self, id: &ResponseId) -> Result<ResponseRecord, ScreeningServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    fn advance(
        &self,
        session: &SessionId,
        state: WizardState,
    ) -> Result<StepOutcome, ScreeningServiceError> {
        let step = state.step;
        self.sessions.save(session, state)?;
        Ok(StepOutcome::InProgress { step })
    }

    fn submit(
        &self,
        context: &AccessContext,
        session: &SessionId,
        mut state: WizardState,
        step: WizardStep,
    ) -> Result<StepOutcome, ScreeningServiceError> {
        let finalized = match finalize(&state, &self.questions, self.staging.as_ref()) {
            Ok(finalized) => finalized,
            Err(errors) => {
                warn!(
                    session = %session,
                    step = step.get(),
                    fields = ?errors.fields().collect::<Vec<_>>(),
                    "submission rejected"
                );
                state.step = WizardStep::FIRST;
                self.sessions.save(session, state)?;
                return Ok(StepOutcome::Rejected {
                    step: WizardStep::FIRST,
                    errors,
                });
            }
        };

        let authoritative = finalized.score();
        let record = ResponseRecord {
            id: ResponseId::generate(),
            created_at: Utc::now(),
            created_by: context.user_id,
            answers: finalized.answers,
            applicant_score: finalized.applicant_score,
            assessment: finalized.assessment.map(|scored| AssessmentRecord {
                assessment: scored.assessment,
                score: scored.score,
                assessed_by: context.user_id,
                assessed_at: Utc::now(),
            }),
            total_score: authoritative.total_score,
            tier: authoritative.tier,
            attachments: finalized
                .attachments
                .iter()
                .map(AttachmentDescriptor::from)
                .collect(),
        };

        let stored = self.repository.insert(record, finalized.attachments)?;
        self.sessions.remove(session)?;
        if let Err(err) = self.staging.discard_session(session) {
            warn!(session = %session, error = %err, "failed to discard staged uploads");
        }

        info!(
            response = %stored.id,
            total_score = stored.total_score,
            tier = stored.tier.label(),
            assessed = stored.assessment.is_some(),
            "screening response submitted"
        );
        Ok(StepOutcome::Submitted(Box::new(stored)))
    }

    fn stage_uploads(
        &self,
        session: &SessionId,
        uploads: Vec<UploadPayload>,
    ) -> Result<Vec<StagedUpload>, ScreeningServiceError> {
        let limit = self.config.upload_max_bytes;
        if let Some(oversized) = uploads.iter().find(|upload| upload.bytes.len() > limit) {
            return Err(StagingError::TooLarge {
                field: oversized.field.clone(),
                size: oversized.bytes.len(),
                limit,
            }
            .into());
        }

        let mut staged = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.staging.stage(session, upload) {
                Ok(reference) => staged.push(reference),
                Err(err) => {
                    self.discard_unreferenced(&BTreeSet::new(), staged);
                    return Err(err.into());
                }
            }
        }
        Ok(staged)
    }

    fn discard_unreferenced(&self, live: &BTreeSet<String>, uploads: Vec<StagedUpload>) {
        for upload in uploads {
            if live.contains(&upload.staging_key) {
                continue;
            }
            if let Err(err) = self.staging.discard(&upload) {
                warn!(field = %upload.field, error = %err, "failed to discard staged upload");
            }
        }
    }
}

fn staging_keys(state: &WizardState) -> BTreeSet<String> {
    state
        .uploads
        .values()
        .map(|upload| upload.staging_key.clone())
        .collect()
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningServiceError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl ScreeningServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScreeningServiceError::Access(AccessDenied::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ScreeningServiceError::Access(_) => StatusCode::BAD_REQUEST,
            ScreeningServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ScreeningServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            ScreeningServiceError::Staging(StagingError::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ScreeningServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScreeningServiceError::Repository(RepositoryError::Unavailable(_))
            | ScreeningServiceError::Session(_)
            | ScreeningServiceError::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
