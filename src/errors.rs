use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Initiative not found with title: {0}")]
    NotFound(String),

    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Wrap Anyhow errors from DB layer

    #[error("Stored initiative data is corrupt: {0}")]
    DataCorruption(String),
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] JsonRejection),

    // Domain/Service level errors (mapped from RepoError)
    #[error("user not found")]
    UserNotFound(String),
    #[error("post not found")]
    InitiativeNotFound(String),
    #[error("Could not access initiative data")]
    RepositoryError(#[source] RepoError),
    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Stable machine-readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) | AppError::MalformedBody(_) => "invalid_input",
            AppError::UserNotFound(_) | AppError::InitiativeNotFound(_) => "not_found",
            AppError::Timeout(_) => "timeout",
            AppError::RepositoryError(_)
            | AppError::ConfigError(_)
            | AppError::InitError(_)
            | AppError::InternalServerError(_) => "internal",
        }
    }
}

// --- Conversions from Domain Errors to AppError ---

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(title) => AppError::InitiativeNotFound(title),
            e @ (RepoError::BackendError(_) | RepoError::DataCorruption(_)) => AppError::RepositoryError(e),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(format!("IO error: {}", err))
    }
}

impl From<aws_smithy_types::error::operation::BuildError> for AppError {
    fn from(err: aws_smithy_types::error::operation::BuildError) -> Self {
        AppError::InitError(format!("Failed to build DynamoDB request: {}", err))
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MalformedBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            AppError::UserNotFound(username) => {
                tracing::debug!(%username, "No initiatives for user");
                (StatusCode::NOT_FOUND, "user not found".to_string())
            }
            AppError::InitiativeNotFound(title) => {
                tracing::debug!(%title, "No initiative with title");
                (StatusCode::NOT_FOUND, "post not found".to_string())
            }

            // 5xx Server Errors
            AppError::RepositoryError(e) => {
                tracing::error!(error.source = ?e, "Repository error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database operation failed".to_string())
            }
            AppError::Timeout(after) => {
                tracing::error!(timeout = ?after, "Store operation timed out");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error".to_string())
            }
            AppError::InitError(msg) => {
                tracing::error!("Initialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server initialization error".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal server error occurred".to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(error.message = %error_message, error.detail = %self, "Responding with error");
        } else {
            tracing::warn!(error.message = %error_message, error.status = %status, "Responding with error");
        }

        let body = Json(serde_json::json!({ "error": error_message, "code": self.code() }));
        (status, body).into_response()
    }
}
