//! Error types for the equipment catalog server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Stable error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Failure,
    NotAuthenticated,
    PermissionDenied,
    DbFailure,
    NotFound,
    BadValue,
    Protected,
}

/// Field name → messages, kept in insertion order
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {}", summarize(.0))]
    Validation(FieldErrors),

    #[error("Referential integrity: {0}")]
    ReferentialIntegrity(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    /// Validation failure on a single field
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.into()]);
        AppError::Validation(fields)
    }

    /// Field-level detail when this is a validation error
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::Validation(fields)
    }
}

/// Map a PostgreSQL unique-constraint name onto the request field it guards
fn constraint_field(constraint: &str) -> &'static str {
    match constraint {
        "uq_equipment_inventory_number" => "inventory_number",
        "uq_characteristic_values_equipment_characteristic" => "characteristic_values",
        "uq_users_login" => "login",
        _ => "name",
    }
}

/// Classify storage-level failures that callers must see as typed errors.
///
/// Unique violations (23505) become validation errors on the guarded field,
/// foreign key violations (23503) become referential-integrity conflicts.
pub fn classify_db_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("23505") => {
                let field = constraint_field(db_err.constraint().unwrap_or_default());
                return AppError::invalid(field, format!("A record with this {} already exists", field));
            }
            Some("23503") => {
                return AppError::ReferentialIntegrity(
                    "Record is still referenced by other records".to_string(),
                );
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

/// Classify a failed insert of rows that reference user-submitted IDs.
///
/// A foreign key violation here means a referenced row vanished after it was
/// checked, which the caller sees as an invalid reference on `field`.
pub fn classify_reference_error(err: sqlx::Error, field: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23503") {
            return AppError::invalid(field, "Referenced record does not exist");
        }
    }
    classify_db_error(err)
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Per-field messages for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub fields: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::PermissionDenied, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::BadValue,
                format!("Validation failed: {}", summarize(fields)),
            ),
            AppError::ReferentialIntegrity(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Protected, msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let fields = match self {
            AppError::Validation(fields) => Some(fields),
            _ => None,
        };

        (status, Json(ErrorResponse { code, message, fields })).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_builds_single_field_error() {
        let err = AppError::invalid("inventory_number", "already exists");
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["inventory_number"], vec!["already exists".to_string()]);
    }

    #[derive(Debug)]
    struct PgFailure {
        code: &'static str,
        constraint: &'static str,
    }

    impl std::fmt::Display for PgFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violation of {}", self.constraint)
        }
    }

    impl std::error::Error for PgFailure {}

    impl sqlx::error::DatabaseError for PgFailure {
        fn message(&self) -> &str {
            "violation"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.code.into())
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.code {
                "23505" => sqlx::error::ErrorKind::UniqueViolation,
                "23503" => sqlx::error::ErrorKind::ForeignKeyViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }
    }

    fn pg_error(code: &'static str, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgFailure { code, constraint }))
    }

    #[test]
    fn database_violations_are_typed() {
        let err = classify_db_error(pg_error("23505", "uq_equipment_inventory_number"));
        assert!(err.field_errors().unwrap().contains_key("inventory_number"));

        let err = classify_db_error(pg_error("23503", "workshops_site_id_fkey"));
        assert!(matches!(err, AppError::ReferentialIntegrity(_)));
    }

    #[test]
    fn vanished_reference_on_insert_is_a_field_error() {
        let err = classify_reference_error(
            pg_error("23503", "characteristic_values_characteristic_id_fkey"),
            "characteristic_values",
        );
        assert!(err.field_errors().unwrap().contains_key("characteristic_values"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = classify_reference_error(
            pg_error("23505", "uq_characteristic_values_equipment_characteristic"),
            "characteristic_values",
        );
        assert!(err.field_errors().unwrap().contains_key("characteristic_values"));
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (AppError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::invalid("name", "x"), StatusCode::BAD_REQUEST),
            (AppError::ReferentialIntegrity("x".into()), StatusCode::CONFLICT),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
