use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::services::{RecordVisitError, StoreError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::services::auth::AuthError;

const RETRY_MESSAGE: &str = "The journal is temporarily unavailable. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Field-level validation failures from a request body.
    #[error("Validation error: {} invalid field(s)", .0.len())]
    InvalidFields(Vec<ValidationDetail>),

    /// A visit write failed and its partial rows were removed.
    #[error("Not recorded: {0}")]
    NotRecorded(String),

    /// A visit row exists without all of its dishes or attendees.
    #[error("Incomplete visit record {visit_id}")]
    IncompleteRecord { visit_id: Uuid },

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visit_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let mut visit_id = None;

        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::InvalidFields(fields) => {
                let message = summarize(&fields);
                details = Some(fields);
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::NotRecorded(msg) => {
                tracing::error!("Visit not recorded: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "not_recorded",
                    "The visit could not be saved and nothing was recorded. Please try again."
                        .into(),
                )
            }
            ApiError::IncompleteRecord { visit_id: id } => {
                tracing::error!(visit_id = %id, "Visit stored with missing details");
                visit_id = Some(id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "incomplete_record",
                    "The visit was recorded with missing dishes or attendees. Please edit it to add them."
                        .into(),
                )
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    RETRY_MESSAGE.into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
            visit_id,
        };

        (status, Json(body)).into_response()
    }
}

fn summarize(details: &[ValidationDetail]) -> String {
    match details {
        [only] => only.message.clone(),
        _ => format!("{} validation errors", details.len()),
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => ApiError::Conflict("Resource already exists".into()),
                Some("23503") => ApiError::NotFound("Referenced resource not found".into()),
                Some("23514") => ApiError::Validation("Value out of allowed range".into()),
                _ => ApiError::Internal(format!("Database error: {}", db_err)),
            },
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_details("", &errors, &mut details);
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::InvalidFields(details)
    }
}

/// Flattens nested errors into dotted paths, e.g. `dishes[1].name`.
fn collect_details(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationDetail>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|e| ValidationDetail {
                    field: path.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", path)),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_details(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_details(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => {
                tracing::debug!("Visit write conflict: {}", msg);
                ApiError::Conflict(
                    "The visit changed while saving. Reload it and try again.".into(),
                )
            }
            StoreError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
            StoreError::Incomplete { visit_id, .. } => ApiError::IncompleteRecord { visit_id },
            StoreError::Other(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<RecordVisitError> for ApiError {
    fn from(err: RecordVisitError) -> Self {
        match err {
            RecordVisitError::AuthenticationRequired => {
                ApiError::Unauthorized("Authentication required".into())
            }
            RecordVisitError::Validation(errors) => errors.into(),
            RecordVisitError::RestaurantNotFound | RecordVisitError::NotFamilyMember => {
                ApiError::NotFound("Restaurant not found".into())
            }
            RecordVisitError::AttendeeNotMember(user_id) => ApiError::Validation(format!(
                "User {} is not a member of this family",
                user_id
            )),
            RecordVisitError::VisitNotFound => ApiError::NotFound("Visit not found".into()),
            RecordVisitError::NotRecorded => {
                ApiError::NotRecorded("partial write rolled back".into())
            }
            RecordVisitError::IncompleteRecord { visit_id } => {
                ApiError::IncompleteRecord { visit_id }
            }
            RecordVisitError::Store(store) => store.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailAlreadyExists => {
                ApiError::Conflict("Email already registered".into())
            }
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".into())
            }
            AuthError::UserDisabled => ApiError::Forbidden("Account is disabled".into()),
            AuthError::InvalidRefreshToken => {
                ApiError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::InvalidResetToken => {
                ApiError::Validation("Invalid or expired reset token".into())
            }
            AuthError::InvalidVerificationToken => {
                ApiError::Validation("Invalid or expired verification token".into())
            }
            AuthError::UserNotFound => ApiError::NotFound("User not found".into()),
            AuthError::DatabaseError(db) => db.into(),
            AuthError::TokenError(e) => ApiError::Internal(format!("Token error: {}", e)),
            AuthError::PasswordError(e) => ApiError::Internal(format!("Password error: {}", e)),
        }
    }
}
