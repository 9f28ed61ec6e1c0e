use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use common::{ErrorResponse, FieldError};
use compute::ComputeError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::schemas::AppState;

/// Every failure a handler can surface to a client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Input validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    InvalidReference(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, please try again later")]
    TooManyRequests,

    /// The payload is logged and never sent in production.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Detail of an internal error, carried on the response so the
/// environment-aware layer can decide whether to expose it.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidReference(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::TooManyRequests => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        match self {
            Self::Validation(details) => (
                status,
                Json(ErrorResponse::new("Input validation failed", code).with_details(details)),
            )
                .into_response(),
            Self::Internal(detail) => {
                error!(%detail, "Request failed with an internal error");
                let mut response =
                    (status, Json(ErrorResponse::new("Internal server error", code))).into_response();
                response.extensions_mut().insert(InternalErrorDetail(detail));
                response
            }
            other => (status, Json(ErrorResponse::new(other.to_string(), code))).into_response(),
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            warn!(%detail, "Unique constraint violated");
            return Self::Conflict("Resource already exists".to_string());
        }
        Self::Internal(err.to_string())
    }
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(db_err) => db_err.into(),
            ComputeError::NotFound(message) => Self::NotFound(message),
            ComputeError::InvalidReference(message) => Self::InvalidReference(message),
            ComputeError::Conflict(message) => Self::Conflict(message),
            ComputeError::Date(message) => Self::validation("date", message),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = wire_name(&field);
                errors.iter().map(move |error| FieldError {
                    field: field.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("is invalid ({})", error.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(details)
    }
}

/// Rust field name to its camelCase JSON spelling.
fn wire_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            name.extend(ch.to_uppercase());
            upper = false;
        } else {
            name.push(ch);
        }
    }
    match name.as_str() {
        "kind" => "type".to_string(),
        _ => name,
    }
}

/// Outside production, replace the generic 500 body with the logged detail.
pub async fn expose_internal_errors(State(state): State<AppState>, mut response: Response) -> Response {
    if state.config.is_production() {
        return response;
    }
    match response.extensions_mut().remove::<InternalErrorDetail>() {
        Some(InternalErrorDetail(detail)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(detail, "INTERNAL_ERROR")),
        )
            .into_response(),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationError;

    #[test]
    fn test_wire_name() {
        assert_eq!(wire_name("category_id"), "categoryId");
        assert_eq!(wire_name("start_date"), "startDate");
        assert_eq!(wire_name("amount"), "amount");
        assert_eq!(wire_name("kind"), "type");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::validation("a", "b").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::TooManyRequests.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_validation_errors_become_field_details() {
        let mut errors = ValidationErrors::new();
        let mut error = ValidationError::new("range");
        error.message = Some("must be a positive id".into());
        errors.add("category_id", error);

        let ApiError::Validation(details) = ApiError::from(errors) else {
            panic!("expected a validation error");
        };
        assert_eq!(
            details,
            vec![FieldError {
                field: "categoryId".to_string(),
                message: "must be a positive id".to_string(),
            }]
        );
    }

    #[test]
    fn test_compute_errors_keep_their_meaning() {
        assert!(matches!(
            ApiError::from(ComputeError::NotFound("gone".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(ComputeError::InvalidReference("Invalid account".into())),
            ApiError::InvalidReference(_)
        ));
        assert!(matches!(
            ApiError::from(ComputeError::Conflict("busy".into())),
            ApiError::Conflict(_)
        ));
    }
}
