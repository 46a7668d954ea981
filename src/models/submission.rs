// src/models/submission.rs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::PublicExam,
        question::{PublicQuestion, Question},
    },
};

/// Lifecycle of a submission:
/// `in_progress -> submitted -> evaluated -> published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
    Evaluated,
    Published,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Evaluated => "evaluated",
            SubmissionStatus::Published => "published",
        }
    }

    /// Evaluated submissions may be re-graded until they are published.
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (InProgress, Submitted)
                | (Submitted, Evaluated)
                | (Evaluated, Evaluated)
                | (Evaluated, Published)
        )
    }

    pub fn transition_to(self, next: SubmissionStatus) -> Result<SubmissionStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::BadRequest(format!(
                "Submission cannot move from '{}' to '{}'",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

/// One entry per exam question, stored in the `answers` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: i64,
    /// Free-text response (subjective questions).
    pub response: Option<String>,
    /// Index into the MCQ options.
    pub selected_option: Option<usize>,
    pub marks_awarded: Option<f64>,
    pub feedback: Option<String>,
}

impl Answer {
    pub fn placeholder(question_id: i64) -> Self {
        Self {
            question_id,
            response: None,
            selected_option: None,
            marks_awarded: None,
            feedback: None,
        }
    }
}

/// Represents the 'submissions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    #[schema(value_type = Vec<Answer>)]
    pub answers: Json<Vec<Answer>>,
    pub status: SubmissionStatus,
    /// Marks awarded so far.
    pub total_marks: f64,
    pub remarks: Option<String>,
    pub is_passed: Option<bool>,
    pub evaluated_by: Option<i64>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One empty answer per question, in question order.
pub fn placeholder_answers(questions: &[Question]) -> Vec<Answer> {
    questions.iter().map(|q| Answer::placeholder(q.id)).collect()
}

/// Builds the stored answer list from a student's hand-in.
///
/// Every exam question gets exactly one entry; unanswered questions stay
/// empty. MCQ answers are scored immediately, subjective ones wait for the
/// teacher. Answers for questions outside the exam are rejected.
pub fn apply_student_answers(
    questions: &[Question],
    inputs: &[AnswerInput],
) -> Result<Vec<Answer>, AppError> {
    let known: HashSet<i64> = questions.iter().map(|q| q.id).collect();
    let mut by_question: HashMap<i64, &AnswerInput> = HashMap::new();
    for input in inputs {
        if !known.contains(&input.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} does not belong to this exam",
                input.question_id
            )));
        }
        by_question.insert(input.question_id, input);
    }

    Ok(questions
        .iter()
        .map(|q| match by_question.get(&q.id) {
            Some(input) => Answer {
                question_id: q.id,
                response: input.response.clone(),
                selected_option: input.selected_option,
                marks_awarded: q.auto_score(input.selected_option),
                feedback: None,
            },
            None => Answer {
                marks_awarded: q.auto_score(None),
                ..Answer::placeholder(q.id)
            },
        })
        .collect())
}

/// Applies a teacher's marks on top of the stored answers.
///
/// Marks must fall within `[0, question.marks]`. Answers the teacher did not
/// mention keep what they had (typically an auto-scored MCQ). Returns the new
/// answers and their total.
pub fn apply_grades(
    questions: &[Question],
    answers: &[Answer],
    grades: &[GradeInput],
) -> Result<(Vec<Answer>, f64), AppError> {
    let max_marks: HashMap<i64, i32> = questions.iter().map(|q| (q.id, q.marks)).collect();
    let mut updated: Vec<Answer> = questions
        .iter()
        .map(|q| {
            answers
                .iter()
                .find(|a| a.question_id == q.id)
                .cloned()
                .unwrap_or_else(|| Answer::placeholder(q.id))
        })
        .collect();

    for grade in grades {
        let max = *max_marks.get(&grade.question_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Question {} does not belong to this exam",
                grade.question_id
            ))
        })?;

        if !grade.marks_awarded.is_finite()
            || grade.marks_awarded < 0.0
            || grade.marks_awarded > max as f64
        {
            return Err(AppError::BadRequest(format!(
                "Marks for question {} must be between 0 and {}",
                grade.question_id, max
            )));
        }

        if let Some(answer) = updated.iter_mut().find(|a| a.question_id == grade.question_id) {
            answer.marks_awarded = Some(grade.marks_awarded);
            if grade.feedback.is_some() {
                answer.feedback = grade.feedback.clone();
            }
        }
    }

    let total = total_awarded(&updated);
    Ok((updated, total))
}

pub fn total_awarded(answers: &[Answer]) -> f64 {
    answers.iter().filter_map(|a| a.marks_awarded).sum()
}

/// DTO for starting an exam.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartExamRequest {
    #[validate(length(min = 1, max = 20, message = "Access code is required."))]
    pub access_code: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: i64,
    pub response: Option<String>,
    pub selected_option: Option<usize>,
}

/// DTO for handing in an attempt. Replaces any previously stored answers.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_answer_sizes))]
pub struct SubmitAnswersRequest {
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

fn validate_answer_sizes(req: &SubmitAnswersRequest) -> Result<(), validator::ValidationError> {
    if req
        .answers
        .iter()
        .any(|a| a.response.as_ref().is_some_and(|r| r.len() > 20_000))
    {
        return Err(validator::ValidationError::new("response_too_long"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradeInput {
    pub question_id: i64,
    pub marks_awarded: f64,
    pub feedback: Option<String>,
}

/// DTO for a teacher grading one submission.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradeSubmissionRequest {
    #[serde(default)]
    pub answers: Vec<GradeInput>,
    #[validate(length(max = 5000))]
    pub remarks: Option<String>,
    /// Overrides the computed pass/fail when present.
    pub is_passed: Option<bool>,
}

/// Returned when a student starts or resumes an exam.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub submission: Submission,
    pub exam: PublicExam,
    pub questions: Vec<PublicQuestion>,
    pub deadline: DateTime<Utc>,
}

/// Teacher's view of a submission with the full answer key alongside.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetail {
    pub submission: Submission,
    pub questions: Vec<Question>,
}

/// Submission listing row for a teacher, joined with the student.
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub submission: Submission,
    pub student_name: String,
    pub roll_number: String,
}

/// A published result as listed for the student.
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub submission_id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub subject: Option<String>,
    pub total_marks: f64,
    pub max_marks: i32,
    pub is_passed: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Full published result with per-question marks and feedback.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetail {
    pub submission: Submission,
    pub exam: PublicExam,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Default, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingCounts {
    pub in_progress: i64,
    pub submitted: i64,
}

/// Result of publishing an exam: what moved and what was left behind ungraded.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub published: u64,
    pub pending: PendingCounts,
}
