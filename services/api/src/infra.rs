use border_screening::workflows::screening::wizard::MaterializedAttachment;
use border_screening::workflows::screening::{
    AttachmentDescriptor, RepositoryError, ResponseId, ResponseRecord, ResponseRepository,
    SessionId, SessionStoreError, StagedUpload, StagingError, StoredAttachment, UploadPayload,
    UploadStaging, WizardSessionStore, WizardState,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, String> {
    mutex.lock().map_err(|_| format!("{name} mutex poisoned"))
}

#[derive(Default)]
struct StoredResponses {
    // Insertion order; listing walks it backwards.
    order: Vec<ResponseId>,
    records: HashMap<ResponseId, ResponseRecord>,
    attachments: HashMap<(ResponseId, String), StoredAttachment>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryResponseRepository {
    inner: Arc<Mutex<StoredResponses>>,
}

impl InMemoryResponseRepository {
    fn guard(&self) -> Result<MutexGuard<'_, StoredResponses>, RepositoryError> {
        lock(&self.inner, "repository").map_err(RepositoryError::Unavailable)
    }
}

impl ResponseRepository for InMemoryResponseRepository {
    fn insert(
        &self,
        record: ResponseRecord,
        attachments: Vec<MaterializedAttachment>,
    ) -> Result<ResponseRecord, RepositoryError> {
        let mut guard = self.guard()?;
        if guard.records.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }

        for attachment in attachments {
            let descriptor = AttachmentDescriptor::from(&attachment);
            guard.attachments.insert(
                (record.id, attachment.field),
                StoredAttachment {
                    descriptor,
                    bytes: attachment.bytes,
                },
            );
        }
        guard.order.push(record.id);
        guard.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
        let mut guard = self.guard()?;
        match guard.records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        Ok(self.guard()?.records.get(id).cloned())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<ResponseRecord>, RepositoryError> {
        let guard = self.guard()?;
        Ok(guard
            .order
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| guard.records.get(id).cloned())
            .collect())
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.guard()?.records.len())
    }

    fn delete(&self, id: &ResponseId) -> Result<(), RepositoryError> {
        let mut guard = self.guard()?;
        if guard.records.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        guard.order.retain(|existing| existing != id);
        guard.attachments.retain(|(owner, _), _| owner != id);
        Ok(())
    }

    fn attachment(
        &self,
        id: &ResponseId,
        field: &str,
    ) -> Result<Option<StoredAttachment>, RepositoryError> {
        let guard = self.guard()?;
        Ok(guard.attachments.get(&(*id, field.to_string())).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryWizardSessions {
    states: Arc<Mutex<HashMap<SessionId, WizardState>>>,
}

impl WizardSessionStore for InMemoryWizardSessions {
    fn load(&self, session: &SessionId) -> Result<Option<WizardState>, SessionStoreError> {
        let guard = lock(&self.states, "session").map_err(SessionStoreError::Unavailable)?;
        Ok(guard.get(session).cloned())
    }

    fn save(&self, session: &SessionId, state: WizardState) -> Result<(), SessionStoreError> {
        let mut guard = lock(&self.states, "session").map_err(SessionStoreError::Unavailable)?;
        guard.insert(session.clone(), state);
        Ok(())
    }

    fn remove(&self, session: &SessionId) -> Result<(), SessionStoreError> {
        let mut guard = lock(&self.states, "session").map_err(SessionStoreError::Unavailable)?;
        guard.remove(session);
        Ok(())
    }
}

struct StagedBlob {
    session: SessionId,
    bytes: Vec<u8>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryUploadStaging {
    blobs: Arc<Mutex<HashMap<String, StagedBlob>>>,
}

impl InMemoryUploadStaging {
    pub(crate) fn staged_count(&self) -> usize {
        lock(&self.blobs, "staging")
            .map(|guard| guard.len())
            .unwrap_or_default()
    }
}

impl UploadStaging for InMemoryUploadStaging {
    fn stage(
        &self,
        session: &SessionId,
        upload: UploadPayload,
    ) -> Result<StagedUpload, StagingError> {
        let staging_key = Uuid::new_v4().to_string();
        let staged = StagedUpload {
            content_type: upload.resolved_content_type(),
            field: upload.field,
            staging_key: staging_key.clone(),
            filename: upload.filename,
            size: upload.bytes.len(),
        };

        let mut guard = lock(&self.blobs, "staging").map_err(StagingError::Unavailable)?;
        guard.insert(
            staging_key,
            StagedBlob {
                session: session.clone(),
                bytes: upload.bytes,
            },
        );
        Ok(staged)
    }

    fn fetch(&self, staged: &StagedUpload) -> Result<Vec<u8>, StagingError> {
        let guard = lock(&self.blobs, "staging").map_err(StagingError::Unavailable)?;
        guard
            .get(&staged.staging_key)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| StagingError::Missing(staged.staging_key.clone()))
    }

    fn discard(&self, staged: &StagedUpload) -> Result<(), StagingError> {
        let mut guard = lock(&self.blobs, "staging").map_err(StagingError::Unavailable)?;
        guard.remove(&staged.staging_key);
        Ok(())
    }

    fn discard_session(&self, session: &SessionId) -> Result<(), StagingError> {
        let mut guard = lock(&self.blobs, "staging").map_err(StagingError::Unavailable)?;
        guard.retain(|_, blob| &blob.session != session);
        Ok(())
    }
}
