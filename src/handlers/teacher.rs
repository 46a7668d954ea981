// src/handlers/teacher.rs

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    extract::{Json, Path},
    handlers::lookup::{current_teacher, exam_questions, find_submission, owned_exam},
    models::{
        exam::{Exam, ExamOverview, UpdateExamRequest, validate_window},
        submission::{
            GradeSubmissionRequest, PendingCounts, PublishOutcome, Submission, SubmissionDetail,
            SubmissionStatus, SubmissionWithStudent, apply_grades,
        },
        user::{Teacher, UpdateTeacherProfileRequest},
    },
    utils::jwt::Claims,
};

/// Returns the teacher's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/teacher/profile",
    tag = "teacher",
    security(("bearer" = [])),
    responses((status = 200, description = "Profile", body = Teacher))
)]
pub async fn get_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(current_teacher(&pool, &claims).await?))
}

/// Updates the teacher's own profile. Absent fields are left unchanged.
#[utoipa::path(
    put,
    path = "/api/v1/teacher/profile",
    tag = "teacher",
    security(("bearer" = [])),
    request_body = UpdateTeacherProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Teacher),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateTeacherProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let teacher = current_teacher(&pool, &claims).await?;

    let updated = sqlx::query_as::<_, Teacher>(
        r#"
        UPDATE teachers SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            department = COALESCE($3, department),
            designation = COALESCE($4, designation),
            phone = COALESCE($5, phone),
            updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.department)
    .bind(payload.designation)
    .bind(payload.phone)
    .bind(teacher.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

/// Lists the teacher's exams with submission counts per status.
#[utoipa::path(
    get,
    path = "/api/v1/teacher/exams",
    tag = "teacher",
    security(("bearer" = [])),
    responses((status = 200, description = "Own exams", body = [ExamOverview]))
)]
pub async fn list_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let teacher = current_teacher(&pool, &claims).await?;

    let exams = sqlx::query_as::<_, ExamOverview>(
        r#"
        SELECT
            e.*,
            (SELECT COUNT(*) FROM questions q WHERE q.exam_id = e.id) AS question_count,
            COUNT(s.id) FILTER (WHERE s.status = 'in_progress') AS in_progress_count,
            COUNT(s.id) FILTER (WHERE s.status = 'submitted') AS submitted_count,
            COUNT(s.id) FILTER (WHERE s.status = 'evaluated') AS evaluated_count,
            COUNT(s.id) FILTER (WHERE s.status = 'published') AS published_count
        FROM exams e
        LEFT JOIN submissions s ON s.exam_id = e.id
        WHERE e.created_by = $1
        GROUP BY e.id
        ORDER BY e.created_at DESC
        "#,
    )
    .bind(teacher.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}

/// Partially updates an exam. Status changes are taken as given.
#[utoipa::path(
    put,
    path = "/api/v1/teacher/exams/{exam_id}",
    tag = "teacher",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    request_body = UpdateExamRequest,
    responses(
        (status = 200, description = "Updated exam", body = Exam),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn update_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;

    let start_time = payload.start_time.unwrap_or(exam.start_time);
    let end_time = payload.end_time.unwrap_or(exam.end_time);
    if validate_window(start_time, end_time).is_err() {
        return Err(AppError::BadRequest(
            "End time must be after start time".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Exam>(
        r#"
        UPDATE exams SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            subject = COALESCE($3, subject),
            department = COALESCE($4, department),
            year = COALESCE($5, year),
            semester = COALESCE($6, semester),
            section = COALESCE($7, section),
            batch = COALESCE($8, batch),
            start_time = $9,
            end_time = $10,
            duration_minutes = COALESCE($11, duration_minutes),
            status = COALESCE($12, status),
            passing_marks = COALESCE($13, passing_marks),
            allowed_roll_numbers = COALESCE($14, allowed_roll_numbers),
            instructions = COALESCE($15, instructions),
            updated_at = NOW()
        WHERE id = $16
        RETURNING *
        "#,
    )
    .bind(payload.title)
    .bind(payload.description)
    .bind(payload.subject)
    .bind(payload.department)
    .bind(payload.year)
    .bind(payload.semester)
    .bind(payload.section)
    .bind(payload.batch)
    .bind(start_time)
    .bind(end_time)
    .bind(payload.duration_minutes)
    .bind(payload.status)
    .bind(payload.passing_marks)
    .bind(payload.allowed_roll_numbers)
    .bind(payload.instructions)
    .bind(exam.id)
    .fetch_one(&pool)
    .await?;

    tracing::info!(exam_id = updated.id, status = ?updated.status, "Exam updated");

    Ok(Json(updated))
}

/// Lists all submissions of an exam with the student's name and roll number.
#[utoipa::path(
    get,
    path = "/api/v1/teacher/exams/{exam_id}/submissions",
    tag = "teacher",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Submissions", body = [SubmissionWithStudent]),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn list_exam_submissions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;

    let submissions = sqlx::query_as::<_, SubmissionWithStudent>(
        r#"
        SELECT
            s.*,
            st.first_name || ' ' || st.last_name AS student_name,
            st.roll_number
        FROM submissions s
        JOIN students st ON st.id = s.student_id
        WHERE s.exam_id = $1
        ORDER BY st.roll_number
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(submissions))
}

/// Loads a submission whose exam the teacher owns.
async fn owned_submission(
    pool: &PgPool,
    submission_id: i64,
    teacher_id: i64,
) -> Result<(Submission, Exam), AppError> {
    let submission = find_submission(pool, submission_id).await?;
    let exam = owned_exam(pool, submission.exam_id, teacher_id).await?;
    Ok((submission, exam))
}

/// Returns a submission together with the exam's full questions.
#[utoipa::path(
    get,
    path = "/api/v1/teacher/submissions/{submission_id}",
    tag = "teacher",
    security(("bearer" = [])),
    params(("submission_id" = i64, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission", body = SubmissionDetail),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn get_submission(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (submission, exam) = owned_submission(&pool, submission_id, claims.user_id()?).await?;
    let questions = exam_questions(&pool, exam.id).await?;

    Ok(Json(SubmissionDetail {
        submission,
        questions,
    }))
}

/// Grades one submission.
///
/// * Allowed from `submitted`, or again from `evaluated` before publishing.
/// * Each mark must lie within `[0, question.marks]`.
/// * Pass/fail is the explicit flag, else total vs. the exam's pass threshold.
#[utoipa::path(
    put,
    path = "/api/v1/teacher/submissions/{submission_id}/grade",
    tag = "teacher",
    security(("bearer" = [])),
    params(("submission_id" = i64, Path, description = "Submission id")),
    request_body = GradeSubmissionRequest,
    responses(
        (status = 200, description = "Graded", body = Submission),
        (status = 400, description = "Wrong status or marks out of range"),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn grade_submission(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
    Json(payload): Json<GradeSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let teacher = current_teacher(&pool, &claims).await?;
    let (submission, exam) = owned_submission(&pool, submission_id, teacher.id).await?;
    let next = submission.status.transition_to(SubmissionStatus::Evaluated)?;

    let questions = exam_questions(&pool, exam.id).await?;
    let (answers, total) = apply_grades(&questions, &submission.answers, &payload.answers)?;
    let is_passed = payload
        .is_passed
        .unwrap_or(total >= exam.pass_threshold());

    let updated = sqlx::query_as::<_, Submission>(
        r#"
        UPDATE submissions SET
            answers = $1,
            status = $2,
            total_marks = $3,
            remarks = COALESCE($4, remarks),
            is_passed = $5,
            evaluated_by = $6,
            evaluated_at = NOW(),
            updated_at = NOW()
        WHERE id = $7 AND status = $8
        RETURNING *
        "#,
    )
    .bind(SqlJson(answers))
    .bind(next)
    .bind(total)
    .bind(payload.remarks)
    .bind(is_passed)
    .bind(teacher.id)
    .bind(submission.id)
    .bind(submission.status)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| {
        AppError::BadRequest("Submission changed while grading; reload and retry".to_string())
    })?;

    tracing::info!(
        submission_id = updated.id,
        teacher_id = teacher.id,
        total,
        is_passed,
        "Submission graded"
    );

    Ok(Json(updated))
}

/// Publishes every evaluated submission of an exam in one statement.
///
/// In-progress and submitted ones are left alone and reported back as
/// pending, so ungraded work is visible rather than silently skipped.
#[utoipa::path(
    post,
    path = "/api/v1/teacher/exams/{exam_id}/publish-results",
    tag = "teacher",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Publish outcome", body = PublishOutcome),
        (status = 403, description = "Not the exam owner"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn publish_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, exam_id, claims.user_id()?).await?;
    let target = SubmissionStatus::Evaluated.transition_to(SubmissionStatus::Published)?;

    let mut tx = pool.begin().await?;

    let published = sqlx::query(
        r#"
        UPDATE submissions
        SET status = $1, published_at = NOW(), updated_at = NOW()
        WHERE exam_id = $2 AND status = $3
        "#,
    )
    .bind(target)
    .bind(exam.id)
    .bind(SubmissionStatus::Evaluated)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let pending = sqlx::query_as::<_, PendingCounts>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
            COUNT(*) FILTER (WHERE status = 'submitted') AS submitted
        FROM submissions
        WHERE exam_id = $1
        "#,
    )
    .bind(exam.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if pending.in_progress > 0 || pending.submitted > 0 {
        tracing::warn!(
            exam_id = exam.id,
            in_progress = pending.in_progress,
            submitted = pending.submitted,
            "Results published with ungraded submissions left behind"
        );
    }
    tracing::info!(exam_id = exam.id, published, "Results published");

    Ok(Json(PublishOutcome { published, pending }))
}
