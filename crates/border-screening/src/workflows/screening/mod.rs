//! Border screening intake: questionnaire wizard, threat scoring and officer assessment.
//!
//! Persistence, wizard session storage and upload staging sit behind traits so the service
//! and router can be exercised against in-memory implementations.

pub mod access;
pub mod domain;
pub mod questions;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use access::{AccessContext, AccessDenied, Permission, PermissionRegistry, Role};
pub use domain::{
    BehaviorIndicator, ClosedChoice, DocumentIssueKind, OfficerAssessment, QuestionnaireAnswers,
    RadicalContentKind, ResponseId, SessionId, UserId,
};
pub use questions::{QuestionSet, TOTAL_STEPS};
pub use repository::{
    AssessmentRecord, AttachmentDescriptor, RepositoryError, ResponseRecord, ResponseRepository,
    ResponseSummary, StoredAttachment,
};
pub use router::screening_router;
pub use scoring::{
    score, score_breakdown, ApplicantFlag, FlagSet, OfficerCriterion, ScoreBreakdown,
    ScoreResult, ThreatTier,
};
pub use service::{
    score_flags, RecalculationSummary, ResponsePage, ScoreReport, ScreeningService,
    ScreeningServiceError, StepOutcome, StepSubmission, WizardView,
};
pub use wizard::{
    finalize, FieldValue, FinalizedSubmission, SessionStoreError, StagedUpload, StagingError,
    SubmittedValue, UploadPayload, UploadStaging, ValidationErrors, WizardAction,
    WizardSessionStore, WizardState, WizardStep,
};
