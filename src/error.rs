use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{policy::DenyReason, repository::StoreError, storage::BlobError};

/// ResourceKind
///
/// Names the link of a resource chain that could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Classroom,
    Member,
    Module,
    Note,
    Homework,
    Lecture,
    Video,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Classroom => "Classroom",
            ResourceKind::Member => "Member",
            ResourceKind::Module => "Module",
            ResourceKind::Note => "Note",
            ResourceKind::Homework => "Homework",
            ResourceKind::Lecture => "Lecture",
            ResourceKind::Video => "Video",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ApiError
///
/// Every failure a gateway operation or handler can produce. Each variant maps to
/// exactly one HTTP status, so domain failures raised deep inside an operation keep
/// their status all the way to the response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(DenyReason),

    #[error("{0} not found")]
    NotFound(ResourceKind),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Identity service error: {0}")]
    AuthProvider(String),
}

impl ApiError {
    pub fn required(field: &str) -> Self {
        ApiError::Validation(format!("{field} is required"))
    }

    pub fn malformed(field: &str) -> Self {
        ApiError::Validation(format!("{field} is malformed"))
    }

    pub fn too_long(field: &str, max_chars: usize) -> Self {
        ApiError::Validation(format!("{field} must be at most {max_chars} characters"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upload(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AuthProvider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        ApiError::Upload(err.to_string())
    }
}

/// ApiResponse
///
/// Uniform envelope for every JSON response, success or failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ApiResponse {
            status_code: status.as_u16(),
            data: serde_json::Value::Null,
            message: self.to_string(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
