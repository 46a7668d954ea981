// src/handlers/question.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    extract::{Json, Path},
    handlers::lookup::{exam_questions, owned_exam, refresh_total_marks},
    models::question::{AddQuestionRequest, CreateQuestionRequest, Question, QuestionRow},
    utils::jwt::Claims,
};

async fn find_question(pool: &PgPool, question_id: i64) -> Result<QuestionRow, AppError> {
    sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

/// Appends a question to an exam and refreshes the exam's total marks.
#[utoipa::path(
    post,
    path = "/api/v1/question",
    tag = "question",
    security(("bearer" = [])),
    request_body = AddQuestionRequest,
    responses(
        (status = 201, description = "Question added", body = Question),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the exam owner")
    )
)]
pub async fn add_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let exam = owned_exam(&pool, payload.exam_id, claims.user_id()?).await?;

    let kind = payload.question.kind();
    let question_type = kind.question_type();
    let (options, model_answer) = kind.into_columns();

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, QuestionRow>(
        r#"
        INSERT INTO questions (exam_id, type, text, marks, options, model_answer, position)
        VALUES ($1, $2, $3, $4, $5, $6,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE exam_id = $1))
        RETURNING *
        "#,
    )
    .bind(exam.id)
    .bind(question_type)
    .bind(payload.question.text.trim())
    .bind(payload.question.marks)
    .bind(options)
    .bind(model_answer)
    .fetch_one(&mut *tx)
    .await?;

    refresh_total_marks(&mut *tx, exam.id).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(Question::try_from(row)?)))
}

/// Lists an exam's questions with answers, in display order.
#[utoipa::path(
    get,
    path = "/api/v1/question/exam/{exam_id}",
    tag = "question",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Questions", body = [Question]),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn list_exam_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;
    Ok(Json(exam_questions(&pool, exam.id).await?))
}

/// Replaces a question's text, marks and variant.
#[utoipa::path(
    put,
    path = "/api/v1/question/{question_id}",
    tag = "question",
    security(("bearer" = [])),
    params(("question_id" = i64, Path, description = "Question id")),
    request_body = CreateQuestionRequest,
    responses(
        (status = 200, description = "Question updated", body = Question),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let existing = find_question(&pool, question_id).await?;
    let exam = owned_exam(&pool, existing.exam_id, claims.user_id()?).await?;

    let kind = payload.kind();
    let question_type = kind.question_type();
    let (options, model_answer) = kind.into_columns();

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, QuestionRow>(
        r#"
        UPDATE questions
        SET type = $1, text = $2, marks = $3, options = $4, model_answer = $5
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(question_type)
    .bind(payload.text.trim())
    .bind(payload.marks)
    .bind(options)
    .bind(model_answer)
    .bind(question_id)
    .fetch_one(&mut *tx)
    .await?;

    refresh_total_marks(&mut *tx, exam.id).await?;
    tx.commit().await?;

    Ok(Json(Question::try_from(row)?))
}

/// Removes a question and refreshes the exam's total marks.
#[utoipa::path(
    delete,
    path = "/api/v1/question/{question_id}",
    tag = "question",
    security(("bearer" = [])),
    params(("question_id" = i64, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = find_question(&pool, question_id).await?;
    let exam = owned_exam(&pool, existing.exam_id, claims.user_id()?).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    refresh_total_marks(&mut *tx, exam.id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
