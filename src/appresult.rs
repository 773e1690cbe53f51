use std::time::Duration;

use axum::{http::{header, HeaderValue, StatusCode}, response::{IntoResponse, Response}, Json};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Client-correctable input problem, echoed verbatim.
    #[error("{0}")]
    Validation(String),

    #[error(
        "Too many submissions. Please try again in {} minutes.",
        ceil_div(.retry_after.as_millis(), 60_000)
    )]
    RateLimited { retry_after: Duration },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Captcha verification failed")]
    CaptchaRejected,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Unavailable(&'static str),

    #[error("{message}")]
    Upstream { status: StatusCode, message: &'static str },

    /// Storage failures carry a caller-chosen public message; the source is logged only.
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("An unexpected error occurred")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Storage { message, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::CaptchaRejected => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream { status, .. } => *status,
            AppError::Storage { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage { source, .. } => tracing::error!(error = %source, "database error"),
            AppError::Internal(err) => tracing::error!(error = ?err, "unexpected error"),
            _ => {}
        }

        let status = self.status_code();
        let message = self.to_string();

        match self {
            AppError::RateLimited { retry_after } => {
                let retry_secs = ceil_div(retry_after.as_millis(), 1000);
                let mut response = (
                    status,
                    Json(json!({
                        "error": message,
                        "retryAfter": retry_after.as_millis() as u64,
                    })),
                ).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_secs as u64),
                );
                response
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}

fn ceil_div(value: u128, unit: u128) -> u128 {
    value.div_ceil(unit)
}
