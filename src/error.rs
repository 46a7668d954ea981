// src/error.rs

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Global Application Error Enum.
/// Every handler returns `Result<_, AppError>`; the `IntoResponse` impl below
/// is the single place where errors become HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request, one message list per offending field
    Validation(ValidationErrors),

    // 400 Bad Request, body did not deserialize; same shape as `Validation`
    InvalidFields(BTreeMap<String, Vec<String>>),

    // 400 Bad Request, unique constraint hit on the named field
    DuplicateField(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Flattens `ValidationErrors` into `field -> [messages]`.
/// Falls back to the error code when a rule has no custom message.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                let body = if cfg!(debug_assertions) {
                    json!({ "error": "Internal Server Error", "detail": msg })
                } else {
                    json!({ "error": "Internal Server Error" })
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Validation failed",
                    "fields": field_messages(&errors),
                }),
            ),
            AppError::InvalidFields(fields) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Validation failed",
                    "fields": fields,
                }),
            ),
            AppError::DuplicateField(field) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("{} already exists", field),
                    "field": field,
                }),
            ),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

/// Maps a unique-constraint name from the schema to the API field it guards.
pub fn constraint_field(constraint: &str) -> String {
    match constraint {
        "students_email_key" | "teachers_email_key" => "email".to_string(),
        "students_roll_number_key" => "rollNumber".to_string(),
        "exams_access_code_key" => "accessCode".to_string(),
        "submissions_exam_student_key" => "submission".to_string(),
        other => other.to_string(),
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Unique violations become 400s naming the field; everything else is a 500.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateField(constraint_field(db_err.constraint().unwrap_or("value")))
            }
            _ => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "Too short"))]
        name: String,
        #[validate(range(min = 1))]
        year: i32,
    }

    #[test]
    fn constraint_names_map_to_fields() {
        assert_eq!(constraint_field("students_email_key"), "email");
        assert_eq!(constraint_field("teachers_email_key"), "email");
        assert_eq!(constraint_field("students_roll_number_key"), "rollNumber");
        assert_eq!(constraint_field("exams_access_code_key"), "accessCode");
        assert_eq!(constraint_field("mystery_key"), "mystery_key");
    }

    #[test]
    fn validation_messages_are_grouped_per_field() {
        let errors = Sample {
            name: "ab".to_string(),
            year: 0,
        }
        .validate()
        .unwrap_err();

        let fields = field_messages(&errors);
        assert_eq!(fields["name"], vec!["Too short".to_string()]);
        assert_eq!(fields["year"], vec!["range".to_string()]);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::DuplicateField("email".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("no".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::AuthError("no".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InternalServerError("boom".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
