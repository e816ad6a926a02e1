use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{OfficerAssessment, QuestionnaireAnswers, ResponseId, UserId};
use super::scoring::{score, ScoreResult, ThreatTier};
use super::wizard::MaterializedAttachment;

/// Officer assessment attached to a stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub assessment: OfficerAssessment,
    pub score: ScoreResult,
    pub assessed_by: Option<UserId>,
    pub assessed_at: DateTime<Utc>,
}

/// Metadata of a stored attachment; the bytes are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

impl From<&MaterializedAttachment> for AttachmentDescriptor {
    fn from(attachment: &MaterializedAttachment) -> Self {
        Self {
            field: attachment.field.clone(),
            filename: attachment.filename.clone(),
            content_type: attachment.content_type.clone(),
            size: attachment.bytes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub descriptor: AttachmentDescriptor,
    pub bytes: Vec<u8>,
}

/// Persisted questionnaire response with its authoritative score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: ResponseId,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub answers: QuestionnaireAnswers,
    pub applicant_score: ScoreResult,
    pub assessment: Option<AssessmentRecord>,
    pub total_score: u32,
    pub tier: ThreatTier,
    pub attachments: Vec<AttachmentDescriptor>,
}

impl ResponseRecord {
    /// The officer score once assessed, the applicant score otherwise.
    pub fn authoritative_score(&self) -> ScoreResult {
        self.assessment
            .as_ref()
            .map(|assessment| assessment.score)
            .unwrap_or(self.applicant_score)
    }

    pub fn apply_authoritative_score(&mut self) {
        let result = self.authoritative_score();
        self.total_score = result.total_score;
        self.tier = result.tier;
    }

    /// Recompute both scales from the stored flags. Returns whether the response tier and the
    /// assessment tier changed.
    pub fn rescore(&mut self) -> (bool, bool) {
        let previous_tier = self.tier;
        self.applicant_score = score(&self.answers.flags());

        let assessment_changed = match self.assessment.as_mut() {
            Some(record) => {
                let fresh = score(&record.assessment.flags());
                let changed = fresh.tier != record.score.tier;
                record.score = fresh;
                changed
            }
            None => false,
        };

        self.apply_authoritative_score();
        (self.tier != previous_tier, assessment_changed)
    }

    pub fn display_label(&self) -> String {
        format!(
            "{} ({}) - {} ({} points)",
            self.answers.display_name(),
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.tier.label(),
            self.total_score
        )
    }

    pub fn summary(&self) -> ResponseSummary {
        ResponseSummary {
            id: self.id,
            label: self.display_label(),
            created_at: self.created_at,
            total_score: self.total_score,
            tier: self.tier,
            assessed: self.assessment.is_some(),
        }
    }
}

/// List entry for the response overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSummary {
    pub id: ResponseId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub total_score: u32,
    pub tier: ThreatTier,
    pub assessed: bool,
}

/// Storage abstraction for responses and their attachments.
///
/// `list` returns records newest first.
pub trait ResponseRepository: Send + Sync {
    fn insert(
        &self,
        record: ResponseRecord,
        attachments: Vec<MaterializedAttachment>,
    ) -> Result<ResponseRecord, RepositoryError>;
    fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError>;
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<ResponseRecord>, RepositoryError>;
    fn count(&self) -> Result<usize, RepositoryError>;
    fn delete(&self, id: &ResponseId) -> Result<(), RepositoryError>;
    fn attachment(
        &self,
        id: &ResponseId,
        field: &str,
    ) -> Result<Option<StoredAttachment>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
