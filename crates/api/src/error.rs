use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use labrack_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `labrack-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The request carried no usable actor identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = classify(&self);

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an error to an HTTP status, stable error code, and message.
fn classify(err: &AppError) -> (StatusCode, &'static str, String) {
    match err {
        // --- CoreError variants ---
        AppError::Core(core) => match core {
            CoreError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            CoreError::InvalidState { .. } => {
                (StatusCode::CONFLICT, "INVALID_STATE", core.to_string())
            }
            CoreError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            CoreError::AlreadyHolder { .. } => {
                (StatusCode::CONFLICT, "ALREADY_HOLDER", core.to_string())
            }
            CoreError::AlreadyQueued { .. } => {
                (StatusCode::CONFLICT, "ALREADY_QUEUED", core.to_string())
            }
            CoreError::NotQueued { .. } => {
                (StatusCode::NOT_FOUND, "NOT_QUEUED", core.to_string())
            }
            CoreError::AlreadyRequested { .. } => {
                (StatusCode::CONFLICT, "ALREADY_REQUESTED", core.to_string())
            }
            CoreError::AlreadyDecided => {
                (StatusCode::CONFLICT, "ALREADY_DECIDED", core.to_string())
            }
            CoreError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
        },

        // --- Database errors ---
        AppError::Database(err) => classify_sqlx_error(err),

        // --- HTTP-specific errors ---
        AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        AppError::InternalError(msg) => {
            tracing::error!(error = %msg, "Internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (
                CoreError::NotFound {
                    entity: "device",
                    id: 1,
                }
                .into(),
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::InvalidState {
                    operation: "use",
                    status: "occupied",
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::PermissionDenied("nope".into()).into(),
                StatusCode::FORBIDDEN,
            ),
            (
                CoreError::AlreadyQueued {
                    identity: "a11111111".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::NotQueued {
                    identity: "a11111111".into(),
                }
                .into(),
                StatusCode::NOT_FOUND,
            ),
            (CoreError::AlreadyDecided.into(), StatusCode::CONFLICT),
            (
                CoreError::Validation("bad".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Unauthorized("no header".into()),
                StatusCode::UNAUTHORIZED,
            ),
        ];

        for (err, expected) in cases {
            let (status, _, _) = classify(&err);
            assert_eq!(status, expected, "wrong status for {err:?}");
        }
    }
}
