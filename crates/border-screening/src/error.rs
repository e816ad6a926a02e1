use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::screening::ScreeningServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Failures surfaced at the edge of the process: startup, serving and the CLI.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Screening(ScreeningServiceError),
    Serialization(serde_json::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Screening(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Telemetry(_) => "telemetry",
            AppError::Io(_) => "io",
            AppError::Server(_) => "server",
            AppError::Screening(_) => "screening",
            AppError::Serialization(_) => "serialization",
        }
    }

    fn inner(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            AppError::Config(err) => err,
            AppError::Telemetry(err) => err,
            AppError::Io(err) => err,
            AppError::Server(err) => err,
            AppError::Screening(err) => err,
            AppError::Serialization(err) => err,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind(), self.inner())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

macro_rules! app_error_from {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$source> for AppError {
                fn from(value: $source) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

app_error_from! {
    ConfigError => Config,
    TelemetryError => Telemetry,
    std::io::Error => Io,
    axum::Error => Server,
    ScreeningServiceError => Screening,
    serde_json::Error => Serialization,
}
