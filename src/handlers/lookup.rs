// src/handlers/lookup.rs

//! Row loaders shared by the handlers. Each one turns "no row" into the
//! status code the API promises for that resource.

use sqlx::{PgExecutor, PgPool};

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        question::{Question, QuestionRow, from_rows},
        submission::Submission,
        user::{Student, Teacher},
    },
    utils::jwt::Claims,
};

/// Loads the student behind a token. A deleted account is a 401, not a 404.
pub async fn current_student(pool: &PgPool, claims: &Claims) -> Result<Student, AppError> {
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
        .bind(claims.user_id()?)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))
}

pub async fn current_teacher(pool: &PgPool, claims: &Claims) -> Result<Teacher, AppError> {
    sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE id = $1")
        .bind(claims.user_id()?)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))
}

pub async fn find_exam<'e>(executor: impl PgExecutor<'e>, exam_id: i64) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = $1")
        .bind(exam_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

/// Loads an exam and checks the caller created it.
pub async fn owned_exam(pool: &PgPool, exam_id: i64, teacher_id: i64) -> Result<Exam, AppError> {
    let exam = find_exam(pool, exam_id).await?;
    if exam.created_by != teacher_id {
        return Err(AppError::Forbidden(
            "You can only manage exams you created".to_string(),
        ));
    }
    Ok(exam)
}

/// Questions of an exam in display order.
pub async fn exam_questions<'e>(
    executor: impl PgExecutor<'e>,
    exam_id: i64,
) -> Result<Vec<Question>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        "SELECT * FROM questions WHERE exam_id = $1 ORDER BY position, id",
    )
    .bind(exam_id)
    .fetch_all(executor)
    .await?;

    from_rows(rows)
}

pub async fn find_submission(pool: &PgPool, submission_id: i64) -> Result<Submission, AppError> {
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
        .bind(submission_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))
}

/// Recomputes an exam's total from its questions.
pub async fn refresh_total_marks<'e>(
    executor: impl PgExecutor<'e>,
    exam_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE exams
        SET total_marks = (SELECT COALESCE(SUM(marks), 0) FROM questions WHERE exam_id = $1),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(exam_id)
    .execute(executor)
    .await?;
    Ok(())
}
