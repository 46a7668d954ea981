// src/handlers/exam.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::ACCESS_CODE_MAX_ATTEMPTS,
    error::AppError,
    extract::{Json, Path},
    handlers::lookup::{current_teacher, exam_questions, owned_exam, refresh_total_marks},
    models::exam::{CreateExamRequest, Exam, ExamDetail, ExamStatus},
    utils::{
        access_code::{generate_access_code, normalize_access_code},
        jwt::Claims,
    },
};

/// Rolls random codes until one is not in use.
///
/// Gives up after `ACCESS_CODE_MAX_ATTEMPTS`; the unique index on
/// `exams.access_code` still catches a collision that races this check.
pub async fn unique_access_code(pool: &PgPool) -> Result<String, AppError> {
    for _ in 0..ACCESS_CODE_MAX_ATTEMPTS {
        let code = generate_access_code();
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exams WHERE access_code = $1)")
                .bind(&code)
                .fetch_one(pool)
                .await?;
        if !taken {
            return Ok(code);
        }
    }

    Err(AppError::InternalServerError(format!(
        "No free access code after {} attempts",
        ACCESS_CODE_MAX_ATTEMPTS
    )))
}

/// Creates an exam, with any inline questions, in one transaction.
#[utoipa::path(
    post,
    path = "/api/v1/exam",
    tag = "exam",
    security(("bearer" = [])),
    request_body = CreateExamRequest,
    responses(
        (status = 201, description = "Exam created", body = ExamDetail),
        (status = 400, description = "Validation failed or access code taken"),
        (status = 403, description = "Teachers only")
    )
)]
pub async fn create_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let teacher = current_teacher(&pool, &claims).await?;

    let access_code = match payload.access_code.as_deref() {
        Some(raw) => normalize_access_code(raw).ok_or_else(|| {
            AppError::BadRequest("Access code must be 6 letters or digits".to_string())
        })?,
        None => unique_access_code(&pool).await?,
    };

    let mut tx = pool.begin().await?;

    let exam = sqlx::query_as::<_, Exam>(
        r#"
        INSERT INTO exams
            (title, description, subject, department, year, semester, section, batch,
             start_time, end_time, duration_minutes, access_code, status,
             passing_marks, allowed_roll_numbers, instructions, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(&payload.subject)
    .bind(payload.department.trim())
    .bind(payload.year)
    .bind(payload.semester)
    .bind(payload.section.trim())
    .bind(&payload.batch)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.duration_minutes)
    .bind(&access_code)
    .bind(payload.status.unwrap_or(ExamStatus::Draft))
    .bind(payload.passing_marks)
    .bind(&payload.allowed_roll_numbers)
    .bind(&payload.instructions)
    .bind(teacher.id)
    .fetch_one(&mut *tx)
    .await?;

    for (position, question) in payload.questions.iter().enumerate() {
        let kind = question.kind();
        let question_type = kind.question_type();
        let (options, model_answer) = kind.into_columns();

        sqlx::query(
            r#"
            INSERT INTO questions (exam_id, type, text, marks, options, model_answer, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(exam.id)
        .bind(question_type)
        .bind(question.text.trim())
        .bind(question.marks)
        .bind(options)
        .bind(model_answer)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    refresh_total_marks(&mut *tx, exam.id).await?;
    let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = $1")
        .bind(exam.id)
        .fetch_one(&mut *tx)
        .await?;
    let questions = exam_questions(&mut *tx, exam.id).await?;

    tx.commit().await?;

    tracing::info!(
        exam_id = exam.id,
        teacher_id = teacher.id,
        questions = questions.len(),
        "Exam created"
    );

    Ok((StatusCode::CREATED, Json(ExamDetail { exam, questions })))
}

/// Returns an exam with its full questions (answer key included).
#[utoipa::path(
    get,
    path = "/api/v1/exam/{exam_id}",
    tag = "exam",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Exam with questions", body = ExamDetail),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn get_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;
    let questions = exam_questions(&pool, exam.id).await?;

    Ok(Json(ExamDetail { exam, questions }))
}

/// Deletes an exam. Its questions and submissions are left in place.
#[utoipa::path(
    delete,
    path = "/api/v1/exam/{exam_id}",
    tag = "exam",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 204, description = "Exam deleted"),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;

    sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(exam.id)
        .execute(&pool)
        .await?;

    tracing::info!(exam_id = exam.id, "Exam deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the exam's access code with a fresh one.
#[utoipa::path(
    post,
    path = "/api/v1/exam/{exam_id}/regenerate-code",
    tag = "exam",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Exam with its new code", body = Exam),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn regenerate_code(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;
    let code = unique_access_code(&pool).await?;

    let exam = sqlx::query_as::<_, Exam>(
        "UPDATE exams SET access_code = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(&code)
    .bind(exam.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(exam))
}
