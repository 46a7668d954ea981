// src/extract.rs

//! Request extractors whose rejections are `AppError`s, so a body or path
//! that fails to deserialize gets the same JSON 400 as a failed `validate()`.

use std::collections::BTreeMap;

use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// Splits a deserializer message into the offending field and a readable message.
///
/// Handles `missing field `x``, `unknown field `x``, and `path: message`.
/// Anything else is reported against `body`.
pub fn data_error_field(raw: &str) -> (String, String) {
    let text = raw.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(raw);
    let text = match text.rfind(" at line ") {
        Some(idx) => &text[..idx],
        None => text,
    };

    let (path, message) = match text.split_once(": ") {
        Some((path, message)) if !path.contains(' ') => (Some(path), message),
        _ => (None, text),
    };

    let quoted = |marker: &str| {
        message
            .strip_prefix(marker)
            .and_then(|rest| rest.split('`').next())
            .map(str::to_string)
    };

    if let Some(name) = quoted("missing field `") {
        let field = match path {
            Some(p) => format!("{}.{}", p, name),
            None => name,
        };
        return (field, "This field is required.".to_string());
    }

    if let Some(name) = quoted("unknown field `") {
        let field = match path {
            Some(p) => format!("{}.{}", p, name),
            None => name,
        };
        return (field, "This field is not accepted here.".to_string());
    }

    match path {
        Some(p) => (p.to_string(), message.to_string()),
        None => ("body".to_string(), message.to_string()),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                let (field, message) = data_error_field(&err.body_text());
                tracing::debug!(field = %field, "Rejected request body");
                AppError::InvalidFields(BTreeMap::from([(field, vec![message])]))
            }
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => {
                AppError::BadRequest(err.body_text())
            }
            other => AppError::InternalServerError(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
