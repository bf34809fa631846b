//! Application-wide error types.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use qf_settlement::ErrorCategory;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event parse error: {0}")]
    EventParse(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] qf_settlement::Error),

    #[error("Missing or invalid caller identity")]
    Unauthenticated,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service is shutting down")]
    Unavailable,
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Ledger(e) => match e.category() {
                ErrorCategory::Authorization => StatusCode::FORBIDDEN,
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                ErrorCategory::Lifecycle | ErrorCategory::Correlation => StatusCode::CONFLICT,
                ErrorCategory::Integrity => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::Backend => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let code = match &self {
            Self::Ledger(e) => Some(e.code()),
            _ => None,
        };
        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
                code,
            }),
        )
            .into_response()
    }
}
