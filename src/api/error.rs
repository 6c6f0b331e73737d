use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed, oversized or incomplete upload
    #[error("{0}")]
    BadRequest(String),

    /// Local staging failure
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Converter missing, crashed or exited nonzero
    #[error("{0}")]
    Conversion(String),

    /// Downstream unreachable, non-200, or converted file unreadable
    #[error("{0}")]
    Forward(String),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Io(_) | AppError::Conversion(_) | AppError::Forward(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Io(_) => "io",
            AppError::Conversion(_) => "conversion",
            AppError::Forward(_) => "forward",
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::BadRequest("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(e.body_text())
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = status.as_u16(), kind = self.kind(), "Error: {}", self);
        } else {
            tracing::warn!(code = status.as_u16(), kind = self.kind(), "Error: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
