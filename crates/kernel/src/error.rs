//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::content::TreeError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Tree(e) => match e {
                TreeError::Resolution(_) | TreeError::Validation(_) => StatusCode::BAD_REQUEST,
                TreeError::NotFound(_) => StatusCode::NOT_FOUND,
                TreeError::Integrity(_) => StatusCode::CONFLICT,
                TreeError::Forbidden(_) => StatusCode::FORBIDDEN,
                TreeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable kind for the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal",
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Tree(e) => e.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details are logged, never returned.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Tree(TreeError::Store(e)) => {
                tracing::error!(error = ?e, "storage failure");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message, "kind": self.kind() }))).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
