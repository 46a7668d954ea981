// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// Discriminator stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "question_type", rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Subjective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct McqOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
/// Only used at the storage boundary; handlers work with [`Question`].
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub exam_id: i64,
    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub marks: i32,
    pub options: Option<Json<Vec<McqOption>>>,
    pub model_answer: Option<String>,
    pub position: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Variant-specific part of a question.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq {
        options: Vec<McqOption>,
    },
    Subjective {
        #[serde(rename = "modelAnswer")]
        model_answer: Option<String>,
    },
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::Mcq { .. } => QuestionType::Mcq,
            QuestionKind::Subjective { .. } => QuestionType::Subjective,
        }
    }

    /// Splits the variant into the `(options, model_answer)` column pair.
    pub fn into_columns(self) -> (Option<Json<Vec<McqOption>>>, Option<String>) {
        match self {
            QuestionKind::Mcq { options } => (Some(Json(options)), None),
            QuestionKind::Subjective { model_answer } => (None, model_answer),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,
    pub text: String,
    pub marks: i32,
    pub position: i32,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let kind = match row.question_type {
            QuestionType::Mcq => QuestionKind::Mcq {
                options: row
                    .options
                    .map(|Json(options)| options)
                    .ok_or_else(|| {
                        AppError::InternalServerError(format!(
                            "MCQ question {} has no options",
                            row.id
                        ))
                    })?,
            },
            QuestionType::Subjective => QuestionKind::Subjective {
                model_answer: row.model_answer,
            },
        };

        Ok(Self {
            id: row.id,
            exam_id: row.exam_id,
            text: row.text,
            marks: row.marks,
            position: row.position,
            kind,
            created_at: row.created_at,
        })
    }
}

impl Question {
    /// Marks an MCQ answer earns on its own; `None` for subjective questions
    /// or when nothing was selected.
    pub fn auto_score(&self, selected_option: Option<usize>) -> Option<f64> {
        match &self.kind {
            QuestionKind::Mcq { options } => {
                let selected = selected_option?;
                let correct = options.get(selected).is_some_and(|o| o.is_correct);
                Some(if correct { self.marks as f64 } else { 0.0 })
            }
            QuestionKind::Subjective { .. } => None,
        }
    }

    pub fn to_public(&self) -> PublicQuestion {
        let kind = match &self.kind {
            QuestionKind::Mcq { options } => PublicQuestionKind::Mcq {
                options: options.iter().map(|o| o.text.clone()).collect(),
            },
            QuestionKind::Subjective { .. } => PublicQuestionKind::Subjective,
        };
        PublicQuestion {
            id: self.id,
            text: self.text.clone(),
            marks: self.marks,
            position: self.position,
            kind,
        }
    }
}

/// Converts fetched rows, failing on the first malformed one.
pub fn from_rows(rows: Vec<QuestionRow>) -> Result<Vec<Question>, AppError> {
    rows.into_iter().map(Question::try_from).collect()
}

/// Question as sent to students: no correct flags, no model answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub marks: i32,
    pub position: i32,
    #[serde(flatten)]
    pub kind: PublicQuestionKind,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PublicQuestionKind {
    Mcq { options: Vec<String> },
    Subjective,
}

/// DTO for creating or replacing a question.
///
/// Arrives flat (`type`, `options`, `modelAnswer`) and is checked against the
/// variant rules before becoming a [`QuestionKind`].
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_variant))]
pub struct CreateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000, message = "Question text must be 1-5000 characters."))]
    pub text: String,
    #[validate(range(min = 1, max = 1000, message = "Marks must be between 1 and 1000."))]
    pub marks: i32,
    pub options: Option<Vec<McqOption>>,
    #[validate(length(max = 10000))]
    pub model_answer: Option<String>,
}

fn variant_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_variant(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    match req.question_type {
        QuestionType::Mcq => {
            let options = req.options.as_deref().unwrap_or_default();
            if options.len() < 2 {
                return Err(variant_error(
                    "mcq_options",
                    "MCQ questions need at least 2 options.",
                ));
            }
            if options.iter().any(|o| o.text.trim().is_empty() || o.text.len() > 1000) {
                return Err(variant_error(
                    "mcq_option_text",
                    "Each option needs 1-1000 characters of text.",
                ));
            }
            if req.model_answer.is_some() {
                return Err(variant_error(
                    "mcq_model_answer",
                    "MCQ questions do not take a model answer.",
                ));
            }
        }
        QuestionType::Subjective => {
            if req.options.is_some() {
                return Err(variant_error(
                    "subjective_options",
                    "Subjective questions do not take options.",
                ));
            }
        }
    }
    Ok(())
}

impl CreateQuestionRequest {
    /// Builds the variant. Call after `validate()`.
    pub fn kind(&self) -> QuestionKind {
        match self.question_type {
            QuestionType::Mcq => QuestionKind::Mcq {
                options: self.options.clone().unwrap_or_default(),
            },
            QuestionType::Subjective => QuestionKind::Subjective {
                model_answer: self.model_answer.clone(),
            },
        }
    }
}

/// DTO for `POST /question`: a question plus the exam it belongs to.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddQuestionRequest {
    pub exam_id: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub question: CreateQuestionRequest,
}
