use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;
use uuid::Uuid;

use crate::config::ScreeningConfig;
use crate::workflows::screening::access::{AccessContext, Role};
use crate::workflows::screening::domain::{ResponseId, SessionId, UserId};
use crate::workflows::screening::repository::{
    AttachmentDescriptor, RepositoryError, ResponseRecord, ResponseRepository, StoredAttachment,
};
use crate::workflows::screening::service::ScreeningService;
use crate::workflows::screening::wizard::{
    MaterializedAttachment, SessionStoreError, StagedUpload, StagingError, SubmittedValue,
    UploadPayload, UploadStaging, WizardSessionStore, WizardState,
};
use crate::workflows::screening::{screening_router, QuestionSet};

pub(super) type TestService = ScreeningService<MemoryRepository, MemorySessions, MemoryStaging>;

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<Vec<ResponseRecord>>,
    attachments: Mutex<BTreeMap<(ResponseId, String), StoredAttachment>>,
}

impl MemoryRepository {
    pub(super) fn records(&self) -> Vec<ResponseRecord> {
        self.records.lock().expect("repository mutex poisoned").clone()
    }

    pub(super) fn overwrite(&self, record: ResponseRecord) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(existing) = guard.iter_mut().find(|existing| existing.id == record.id) {
            *existing = record;
        }
    }
}

impl ResponseRepository for MemoryRepository {
    fn insert(
        &self,
        record: ResponseRecord,
        attachments: Vec<MaterializedAttachment>,
    ) -> Result<ResponseRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        let mut stored = self.attachments.lock().expect("attachment mutex poisoned");
        for attachment in attachments {
            stored.insert(
                (record.id, attachment.field.clone()),
                StoredAttachment {
                    descriptor: AttachmentDescriptor::from(&attachment),
                    bytes: attachment.bytes,
                },
            );
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.iter().find(|record| &record.id == id).cloned())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<ResponseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.iter().rev().skip(offset).take(limit).cloned().collect())
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.records.lock().expect("repository mutex poisoned").len())
    }

    fn delete(&self, id: &ResponseId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|record| &record.id != id);
        if guard.len() == before {
            return Err(RepositoryError::NotFound);
        }
        self.attachments
            .lock()
            .expect("attachment mutex poisoned")
            .retain(|(owner, _), _| owner != id);
        Ok(())
    }

    fn attachment(
        &self,
        id: &ResponseId,
        field: &str,
    ) -> Result<Option<StoredAttachment>, RepositoryError> {
        let guard = self.attachments.lock().expect("attachment mutex poisoned");
        Ok(guard.get(&(*id, field.to_string())).cloned())
    }
}

pub(super) struct UnavailableRepository;

impl ResponseRepository for UnavailableRepository {
    fn insert(
        &self,
        _record: ResponseRecord,
        _attachments: Vec<MaterializedAttachment>,
    ) -> Result<ResponseRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ResponseRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _offset: usize, _limit: usize) -> Result<Vec<ResponseRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ResponseId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn attachment(
        &self,
        _id: &ResponseId,
        _field: &str,
    ) -> Result<Option<StoredAttachment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemorySessions {
    states: Mutex<BTreeMap<SessionId, WizardState>>,
    reject_saves: AtomicBool,
}

impl MemorySessions {
    pub(super) fn reject_saves(&self) {
        self.reject_saves.store(true, Ordering::SeqCst);
    }

    pub(super) fn state(&self, session: &SessionId) -> Option<WizardState> {
        self.states
            .lock()
            .expect("session mutex poisoned")
            .get(session)
            .cloned()
    }
}

impl WizardSessionStore for MemorySessions {
    fn load(&self, session: &SessionId) -> Result<Option<WizardState>, SessionStoreError> {
        Ok(self.state(session))
    }

    fn save(&self, session: &SessionId, state: WizardState) -> Result<(), SessionStoreError> {
        if self.reject_saves.load(Ordering::SeqCst) {
            return Err(SessionStoreError::Unavailable("session cache offline".to_string()));
        }
        self.states
            .lock()
            .expect("session mutex poisoned")
            .insert(session.clone(), state);
        Ok(())
    }

    fn remove(&self, session: &SessionId) -> Result<(), SessionStoreError> {
        self.states
            .lock()
            .expect("session mutex poisoned")
            .remove(session);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryStaging {
    sequence: AtomicU64,
    blobs: Mutex<BTreeMap<String, (SessionId, Vec<u8>)>>,
}

impl MemoryStaging {
    pub(super) fn blob_count(&self) -> usize {
        self.blobs.lock().expect("staging mutex poisoned").len()
    }

    pub(super) fn drop_blob(&self, key: &str) {
        self.blobs.lock().expect("staging mutex poisoned").remove(key);
    }
}

impl UploadStaging for MemoryStaging {
    fn stage(
        &self,
        session: &SessionId,
        upload: UploadPayload,
    ) -> Result<StagedUpload, StagingError> {
        let key = format!("stage-{}", self.sequence.fetch_add(1, Ordering::Relaxed));
        let staged = StagedUpload {
            field: upload.field.clone(),
            staging_key: key.clone(),
            filename: upload.filename.clone(),
            content_type: upload.resolved_content_type(),
            size: upload.bytes.len(),
        };
        self.blobs
            .lock()
            .expect("staging mutex poisoned")
            .insert(key, (session.clone(), upload.bytes));
        Ok(staged)
    }

    fn fetch(&self, staged: &StagedUpload) -> Result<Vec<u8>, StagingError> {
        self.blobs
            .lock()
            .expect("staging mutex poisoned")
            .get(&staged.staging_key)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StagingError::Missing(staged.staging_key.clone()))
    }

    fn discard(&self, staged: &StagedUpload) -> Result<(), StagingError> {
        self.drop_blob(&staged.staging_key);
        Ok(())
    }

    fn discard_session(&self, session: &SessionId) -> Result<(), StagingError> {
        self.blobs
            .lock()
            .expect("staging mutex poisoned")
            .retain(|_, (owner, _)| owner != session);
        Ok(())
    }
}

pub(super) fn config() -> ScreeningConfig {
    ScreeningConfig {
        upload_max_bytes: 64,
        responses_page_size: 2,
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryRepository>,
    Arc<MemorySessions>,
    Arc<MemoryStaging>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let sessions = Arc::new(MemorySessions::default());
    let staging = Arc::new(MemoryStaging::default());
    let service = ScreeningService::new(
        repository.clone(),
        sessions.clone(),
        staging.clone(),
        config(),
    );
    (service, repository, sessions, staging)
}

pub(super) fn screening_router_with_service(service: TestService) -> axum::Router {
    screening_router(Arc::new(service))
}

pub(super) fn questions() -> QuestionSet {
    QuestionSet::standard()
}

pub(super) fn session(name: &str) -> SessionId {
    SessionId(name.to_string())
}

pub(super) fn submitter() -> AccessContext {
    AccessContext::new(Role::Submitter, Some(UserId(Uuid::new_v4())))
}

pub(super) fn manager() -> AccessContext {
    AccessContext::new(Role::Manager, Some(UserId(Uuid::new_v4())))
}

pub(super) fn admin() -> AccessContext {
    AccessContext::new(Role::Admin, Some(UserId(Uuid::new_v4())))
}

pub(super) fn text(value: &str) -> SubmittedValue {
    SubmittedValue::Single(value.to_string())
}

pub(super) fn checked() -> SubmittedValue {
    SubmittedValue::Single("on".to_string())
}

pub(super) fn tags(values: &[&str]) -> SubmittedValue {
    SubmittedValue::Multiple(values.iter().map(|value| value.to_string()).collect())
}

pub(super) fn fields(entries: &[(&str, SubmittedValue)]) -> BTreeMap<String, SubmittedValue> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub(super) fn png_upload(field: &str) -> UploadPayload {
    UploadPayload {
        field: field.to_string(),
        filename: "scan.png".to_string(),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
