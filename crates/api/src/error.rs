use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use gpc_models::GpcError;
use tracing::{error, warn};

use crate::routes::ApiResponse;

#[derive(Debug)]
pub enum ApiError {
    Domain(GpcError),
    /// Body that axum could not read as the expected JSON.
    Json(JsonRejection),
    BadUpload(String),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Domain(GpcError::ModelUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Domain(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json(rejection) => rejection.status(),
            Self::BadUpload(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Label used for the `kind` dimension of the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(e) if e.is_validation() => "validation",
            Self::Json(_) => "validation",
            Self::Domain(GpcError::ModelUnavailable { .. }) => "unavailable",
            Self::Domain(_) => "prediction",
            Self::BadUpload(_) => "upload",
            Self::Internal(_) => "internal",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Domain(e) => e.to_string(),
            Self::Json(rejection) => rejection.body_text(),
            Self::BadUpload(reason) => reason.clone(),
            Self::Internal(e) => format!("{e:#}"),
        }
    }
}

impl From<GpcError> for ApiError {
    fn from(e: GpcError) -> Self {
        Self::Domain(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Json(rejection)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!("❌ {}", message);
        } else {
            warn!("⚠️  Rejected request: {}", message);
        }

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
