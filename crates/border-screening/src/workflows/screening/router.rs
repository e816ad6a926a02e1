use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::access::AccessContext;
use super::domain::{ResponseId, SessionId};
use super::repository::ResponseRepository;
use super::service::{
    ScreeningService, ScreeningServiceError, StepOutcome, StepSubmission,
};
use super::wizard::{SubmittedValue, UploadPayload, UploadStaging, WizardAction, WizardSessionStore};

type SharedService<R, W, U> = Arc<ScreeningService<R, W, U>>;

/// Step submission body. Upload contents travel base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct StepRequest {
    #[serde(default = "first_step")]
    pub current_step: u32,
    #[serde(default)]
    pub action: WizardAction,
    #[serde(default)]
    pub fields: BTreeMap<String, SubmittedValue>,
    #[serde(default)]
    pub uploads: Vec<UploadRequest>,
    #[serde(default)]
    pub clear_uploads: Vec<String>,
}

fn first_step() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub field: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub data: String,
}

impl StepRequest {
    fn into_submission(self) -> Result<StepSubmission, String> {
        let uploads = self
            .uploads
            .into_iter()
            .map(|upload| {
                let bytes = STANDARD
                    .decode(upload.data.trim())
                    .map_err(|_| format!("upload for {} is not valid base64", upload.field))?;
                Ok(UploadPayload {
                    field: upload.field,
                    filename: upload.filename,
                    content_type: upload.content_type,
                    bytes,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(StepSubmission {
            current_step: self.current_step,
            action: self.action,
            fields: self.fields,
            uploads,
            clear_uploads: self.clear_uploads,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub applicant: Vec<String>,
    #[serde(default)]
    pub officer: Vec<String>,
}

/// Router builder exposing the wizard, response administration and scoring endpoints.
pub fn screening_router<R, W, U>(service: SharedService<R, W, U>) -> Router
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    Router::new()
        .route(
            "/api/v1/screening/wizard/:session_id",
            get(wizard_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/wizard/:session_id/steps",
            post(step_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/responses",
            get(list_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/responses/:response_id",
            get(detail_handler::<R, W, U>).delete(delete_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/responses/:response_id/assessment",
            put(assessment_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/responses/:response_id/attachments/:field",
            get(attachment_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/score",
            post(score_handler::<R, W, U>),
        )
        .route(
            "/api/v1/screening/recalculate",
            post(recalculate_handler::<R, W, U>),
        )
        .with_state(service)
}

pub(crate) async fn wizard_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.wizard(&context, &SessionId(session_id)));

    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn step_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(request): Json<StepRequest>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let context = match AccessContext::from_headers(&headers) {
        Ok(context) => context,
        Err(err) => return error_response(err.into()),
    };
    let submission = match request.into_submission() {
        Ok(submission) => submission,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
    };

    match service.apply_step(&context, &SessionId(session_id), submission) {
        Ok(StepOutcome::InProgress { step }) => (
            StatusCode::OK,
            Json(json!({ "status": "in_progress", "step": step })),
        )
            .into_response(),
        Ok(StepOutcome::Submitted(record)) => (
            StatusCode::CREATED,
            Json(json!({ "status": "submitted", "response": record })),
        )
            .into_response(),
        Ok(StepOutcome::Rejected { step, errors }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "status": "rejected", "step": step, "errors": errors })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.list(&context, query.page.unwrap_or(1)));

    match result {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn detail_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Path(response_id): Path<Uuid>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.get(&context, &ResponseId(response_id)));

    match result {
        Ok(record) => {
            let label = record.display_label();
            (
                StatusCode::OK,
                Json(json!({ "label": label, "response": record })),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Path(response_id): Path<Uuid>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.delete(&context, &ResponseId(response_id)));

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn assessment_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Path(response_id): Path<Uuid>,
    Json(fields): Json<BTreeMap<String, SubmittedValue>>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.assess(&context, &ResponseId(response_id), fields));

    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn attachment_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Path((response_id, field)): Path<(Uuid, String)>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.attachment(&context, &ResponseId(response_id), &field));

    match result {
        Ok(attachment) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                attachment.descriptor.filename.replace('"', "")
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, attachment.descriptor.content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                attachment.bytes,
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn score_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
    Json(request): Json<ScoreRequest>,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.score(&context, &request.applicant, &request.officer));

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recalculate_handler<R, W, U>(
    State(service): State<SharedService<R, W, U>>,
    headers: HeaderMap,
) -> Response
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    let result = AccessContext::from_headers(&headers)
        .map_err(ScreeningServiceError::from)
        .and_then(|context| service.recalculate(&context));

    match result {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ScreeningServiceError) -> Response {
    let status = err.status_code();
    let payload = match &err {
        ScreeningServiceError::Validation(errors) => json!({
            "error": err.to_string(),
            "errors": errors,
        }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, Json(payload)).into_response()
}
