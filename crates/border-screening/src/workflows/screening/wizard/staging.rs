use serde::{Deserialize, Serialize};

use super::super::domain::SessionId;
use super::{StagedUpload, WizardState};

/// Upload as received from a client, before staging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    pub field: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadPayload {
    /// Declared content type, or one guessed from the file name.
    pub fn resolved_content_type(&self) -> String {
        match self.content_type.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => mime_guess::from_path(&self.filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

/// Short-lived server-side area holding upload blobs between wizard steps.
///
/// `stage` must hand out a key that is unique per call so a replaced upload can be discarded
/// without touching its successor.
pub trait UploadStaging: Send + Sync {
    fn stage(
        &self,
        session: &SessionId,
        upload: UploadPayload,
    ) -> Result<StagedUpload, StagingError>;
    fn fetch(&self, staged: &StagedUpload) -> Result<Vec<u8>, StagingError>;
    fn discard(&self, staged: &StagedUpload) -> Result<(), StagingError>;
    fn discard_session(&self, session: &SessionId) -> Result<(), StagingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("upload for {field} is {size} bytes, limit is {limit}")]
    TooLarge {
        field: String,
        size: usize,
        limit: usize,
    },
    #[error("staged upload {0} no longer available")]
    Missing(String),
    #[error("staging area unavailable: {0}")]
    Unavailable(String),
}

/// Storage of wizard state keyed by session.
pub trait WizardSessionStore: Send + Sync {
    fn load(&self, session: &SessionId) -> Result<Option<WizardState>, SessionStoreError>;
    fn save(&self, session: &SessionId, state: WizardState) -> Result<(), SessionStoreError>;
    fn remove(&self, session: &SessionId) -> Result<(), SessionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}
