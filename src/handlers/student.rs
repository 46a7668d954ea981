// src/handlers/student.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    extract::{Json, Path},
    handlers::lookup::{current_student, exam_questions, find_exam, find_submission},
    models::{
        exam::{Exam, PublicExam},
        submission::{
            AttemptView, ResultDetail, ResultSummary, StartExamRequest, SubmitAnswersRequest,
            Submission, SubmissionStatus, apply_student_answers, placeholder_answers,
            total_awarded,
        },
        user::{Student, UpdateStudentProfileRequest},
    },
    utils::jwt::Claims,
};

/// Exams for the student's class, filtered by an extra time condition.
async fn class_exams(
    pool: &PgPool,
    student: &Student,
    time_condition: &str,
) -> Result<Vec<PublicExam>, AppError> {
    let sql = format!(
        r#"
        SELECT * FROM exams
        WHERE LOWER(TRIM(department)) = LOWER(TRIM($1))
          AND year = $2
          AND LOWER(TRIM(section)) = LOWER(TRIM($3))
          AND status <> 'completed'
          AND {}
        ORDER BY start_time
        "#,
        time_condition
    );

    let exams = sqlx::query_as::<_, Exam>(&sql)
        .bind(&student.department)
        .bind(student.year)
        .bind(&student.section)
        .fetch_all(pool)
        .await?;

    Ok(exams
        .into_iter()
        .filter(|e| e.admits_roll_number(&student.roll_number))
        .map(PublicExam::from)
        .collect())
}

/// Exams of the student's class that are open right now.
pub async fn open_exams_for(pool: &PgPool, student: &Student) -> Result<Vec<PublicExam>, AppError> {
    class_exams(pool, student, "start_time <= NOW() AND end_time >= NOW()").await
}

pub async fn upcoming_exams_for(
    pool: &PgPool,
    student: &Student,
) -> Result<Vec<PublicExam>, AppError> {
    class_exams(pool, student, "start_time > NOW()").await
}

/// Loads a submission and checks it belongs to the student.
async fn own_submission(
    pool: &PgPool,
    submission_id: i64,
    student: &Student,
) -> Result<Submission, AppError> {
    let submission = find_submission(pool, submission_id).await?;
    if submission.student_id != student.id {
        return Err(AppError::Forbidden(
            "This submission belongs to another student".to_string(),
        ));
    }
    Ok(submission)
}

async fn attempt_view(pool: &PgPool, submission: Submission) -> Result<AttemptView, AppError> {
    let exam = find_exam(pool, submission.exam_id).await?;
    let questions = exam_questions(pool, exam.id).await?;

    Ok(AttemptView {
        deadline: exam.deadline_for(submission.started_at),
        questions: questions.iter().map(|q| q.to_public()).collect(),
        exam: PublicExam::from(exam),
        submission,
    })
}

/// Returns the student's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/student/profile",
    tag = "student",
    security(("bearer" = [])),
    responses((status = 200, description = "Profile", body = Student))
)]
pub async fn get_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(current_student(&pool, &claims).await?))
}

/// Updates the student's own profile. Absent fields are left unchanged.
#[utoipa::path(
    put,
    path = "/api/v1/student/profile",
    tag = "student",
    security(("bearer" = [])),
    request_body = UpdateStudentProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Student),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_profile(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateStudentProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student = current_student(&pool, &claims).await?;

    let updated = sqlx::query_as::<_, Student>(
        r#"
        UPDATE students SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            phone = COALESCE($3, phone),
            batch = COALESCE($4, batch),
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.phone)
    .bind(payload.batch)
    .bind(student.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

/// Lists exams of the student's class whose window is open now.
#[utoipa::path(
    get,
    path = "/api/v1/student/exams/active",
    tag = "student",
    security(("bearer" = [])),
    responses((status = 200, description = "Open exams", body = [PublicExam]))
)]
pub async fn active_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = current_student(&pool, &claims).await?;
    Ok(Json(open_exams_for(&pool, &student).await?))
}

/// Lists exams of the student's class that have not started yet.
#[utoipa::path(
    get,
    path = "/api/v1/student/exams/upcoming",
    tag = "student",
    security(("bearer" = [])),
    responses((status = 200, description = "Upcoming exams", body = [PublicExam]))
)]
pub async fn upcoming_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = current_student(&pool, &claims).await?;
    Ok(Json(upcoming_exams_for(&pool, &student).await?))
}

/// Starts (or resumes) an exam attempt.
///
/// * Runs the access gate: code, time window, class, roll list.
/// * Creates one `in_progress` submission with an empty answer per question.
/// * A second call while that submission is still in progress returns it.
#[utoipa::path(
    post,
    path = "/api/v1/student/exams/{exam_id}/start",
    tag = "student",
    security(("bearer" = [])),
    params(("exam_id" = i64, Path, description = "Exam id")),
    request_body = StartExamRequest,
    responses(
        (status = 201, description = "Attempt created", body = AttemptView),
        (status = 200, description = "Existing attempt resumed", body = AttemptView),
        (status = 400, description = "Exam already submitted"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn start_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student = current_student(&pool, &claims).await?;
    let exam = find_exam(&pool, exam_id).await?;

    if let Err(denied) = exam.check_access(&student, &payload.access_code, Utc::now()) {
        tracing::warn!(
            exam_id = exam.id,
            student_id = student.id,
            reason = ?denied,
            "Exam access denied"
        );
        return Err(AppError::Forbidden(denied.message().to_string()));
    }

    let questions = exam_questions(&pool, exam.id).await?;

    // The unique (exam_id, student_id) index makes concurrent starts collapse
    // onto a single row.
    let inserted = sqlx::query_as::<_, Submission>(
        r#"
        INSERT INTO submissions (exam_id, student_id, answers)
        VALUES ($1, $2, $3)
        ON CONFLICT (exam_id, student_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(exam.id)
    .bind(student.id)
    .bind(SqlJson(placeholder_answers(&questions)))
    .fetch_optional(&pool)
    .await?;

    let (status, submission) = match inserted {
        Some(submission) => {
            tracing::info!(
                exam_id = exam.id,
                student_id = student.id,
                submission_id = submission.id,
                "Exam started"
            );
            (StatusCode::CREATED, submission)
        }
        None => {
            let existing = sqlx::query_as::<_, Submission>(
                "SELECT * FROM submissions WHERE exam_id = $1 AND student_id = $2",
            )
            .bind(exam.id)
            .bind(student.id)
            .fetch_one(&pool)
            .await?;

            if existing.status != SubmissionStatus::InProgress {
                return Err(AppError::BadRequest(
                    "You have already submitted this exam".to_string(),
                ));
            }
            (StatusCode::OK, existing)
        }
    };

    let view = AttemptView {
        deadline: exam.deadline_for(submission.started_at),
        questions: questions.iter().map(|q| q.to_public()).collect(),
        exam: PublicExam::from(exam),
        submission,
    };

    Ok((status, Json(view)))
}

/// Lists the student's own submissions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/student/submissions",
    tag = "student",
    security(("bearer" = [])),
    responses((status = 200, description = "Own submissions", body = [Submission]))
)]
pub async fn list_submissions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = current_student(&pool, &claims).await?;

    let submissions = sqlx::query_as::<_, Submission>(
        "SELECT * FROM submissions WHERE student_id = $1 ORDER BY started_at DESC",
    )
    .bind(student.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(submissions))
}

/// Returns one of the student's submissions with the exam's public questions.
#[utoipa::path(
    get,
    path = "/api/v1/student/submissions/{submission_id}",
    tag = "student",
    security(("bearer" = [])),
    params(("submission_id" = i64, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Attempt", body = AttemptView),
        (status = 403, description = "Not your submission"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn get_submission(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student = current_student(&pool, &claims).await?;
    let submission = own_submission(&pool, submission_id, &student).await?;

    Ok(Json(attempt_view(&pool, submission).await?))
}

/// Hands in an attempt.
///
/// Only an `in_progress` submission can be submitted, and only before the
/// exam's end time. The stored answers are replaced and MCQ answers scored.
#[utoipa::path(
    put,
    path = "/api/v1/student/submissions/{submission_id}/submit",
    tag = "student",
    security(("bearer" = [])),
    params(("submission_id" = i64, Path, description = "Submission id")),
    request_body = SubmitAnswersRequest,
    responses(
        (status = 200, description = "Submitted", body = Submission),
        (status = 400, description = "Already submitted, exam closed or unknown question"),
        (status = 403, description = "Not your submission"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn submit_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student = current_student(&pool, &claims).await?;
    let submission = own_submission(&pool, submission_id, &student).await?;
    let next = submission.status.transition_to(SubmissionStatus::Submitted)?;

    let exam = find_exam(&pool, submission.exam_id).await?;
    if Utc::now() >= exam.end_time {
        tracing::warn!(
            exam_id = exam.id,
            submission_id = submission.id,
            "Late submission rejected"
        );
        return Err(AppError::BadRequest(
            "The exam has ended; submissions are closed".to_string(),
        ));
    }

    let questions = exam_questions(&pool, exam.id).await?;
    let answers = apply_student_answers(&questions, &payload.answers)?;
    let total = total_awarded(&answers);

    // Guarded on the current status so two racing hand-ins cannot both win.
    let updated = sqlx::query_as::<_, Submission>(
        r#"
        UPDATE submissions
        SET answers = $1, status = $2, total_marks = $3,
            submitted_at = NOW(), updated_at = NOW()
        WHERE id = $4 AND status = $5
        RETURNING *
        "#,
    )
    .bind(SqlJson(answers))
    .bind(next)
    .bind(total)
    .bind(submission.id)
    .bind(submission.status)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::BadRequest("Submission was already handed in".to_string()))?;

    tracing::info!(
        exam_id = exam.id,
        submission_id = updated.id,
        "Exam submitted"
    );

    Ok(Json(updated))
}

/// Lists the student's published results.
#[utoipa::path(
    get,
    path = "/api/v1/student/results",
    tag = "student",
    security(("bearer" = [])),
    responses((status = 200, description = "Published results", body = [ResultSummary]))
)]
pub async fn list_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = current_student(&pool, &claims).await?;

    let results = sqlx::query_as::<_, ResultSummary>(
        r#"
        SELECT
            s.id AS submission_id,
            s.exam_id,
            e.title AS exam_title,
            e.subject,
            s.total_marks,
            e.total_marks AS max_marks,
            s.is_passed,
            s.published_at
        FROM submissions s
        JOIN exams e ON e.id = s.exam_id
        WHERE s.student_id = $1 AND s.status = 'published'
        ORDER BY s.published_at DESC
        "#,
    )
    .bind(student.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}

/// Returns a published result with per-question marks and feedback.
/// Unpublished submissions are reported as not found.
#[utoipa::path(
    get,
    path = "/api/v1/student/results/{submission_id}",
    tag = "student",
    security(("bearer" = [])),
    params(("submission_id" = i64, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Result", body = ResultDetail),
        (status = 404, description = "No published result")
    )
)]
pub async fn get_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student = current_student(&pool, &claims).await?;
    let submission = own_submission(&pool, submission_id, &student).await?;

    if submission.status != SubmissionStatus::Published {
        return Err(AppError::NotFound("Result not published yet".to_string()));
    }

    let exam = find_exam(&pool, submission.exam_id).await?;
    let questions = exam_questions(&pool, exam.id).await?;

    Ok(Json(ResultDetail {
        submission,
        questions: questions.iter().map(|q| q.to_public()).collect(),
        exam: PublicExam::from(exam),
    }))
}
