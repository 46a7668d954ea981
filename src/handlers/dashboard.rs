// src/handlers/dashboard.rs

use std::collections::HashSet;

use axum::{Extension, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    extract::Json,
    handlers::{
        lookup::current_student,
        student::{open_exams_for, upcoming_exams_for},
    },
    models::{
        dashboard::{
            ActivityItem, DashboardStats, StudentStats, TeacherStats, TeacherTodo, TodoList,
            average_percentage,
        },
        user::Role,
    },
    utils::jwt::Claims,
};

const ACTIVITY_LIMIT: i64 = 10;

async fn teacher_stats(pool: &PgPool, teacher_id: i64) -> Result<TeacherStats, AppError> {
    let (total_exams, active_exams): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE start_time <= NOW() AND end_time >= NOW())
        FROM exams
        WHERE created_by = $1
        "#,
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    let (total_submissions, pending_evaluations, published_results): (i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE s.status = 'submitted'),
                COUNT(*) FILTER (WHERE s.status = 'published')
            FROM submissions s
            JOIN exams e ON e.id = s.exam_id
            WHERE e.created_by = $1
            "#,
        )
        .bind(teacher_id)
        .fetch_one(pool)
        .await?;

    Ok(TeacherStats {
        total_exams,
        active_exams,
        total_submissions,
        pending_evaluations,
        published_results,
    })
}

async fn student_stats(pool: &PgPool, claims: &Claims) -> Result<StudentStats, AppError> {
    let student = current_student(pool, claims).await?;

    let (exams_taken, pending_results, published_results): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status <> 'in_progress'),
            COUNT(*) FILTER (WHERE status IN ('submitted', 'evaluated')),
            COUNT(*) FILTER (WHERE status = 'published')
        FROM submissions
        WHERE student_id = $1
        "#,
    )
    .bind(student.id)
    .fetch_one(pool)
    .await?;

    let scores: Vec<(f64, i32)> = sqlx::query_as(
        r#"
        SELECT s.total_marks, e.total_marks
        FROM submissions s
        JOIN exams e ON e.id = s.exam_id
        WHERE s.student_id = $1 AND s.status = 'published'
        "#,
    )
    .bind(student.id)
    .fetch_all(pool)
    .await?;

    let upcoming_exams = upcoming_exams_for(pool, &student).await?.len() as i64;

    Ok(StudentStats {
        exams_taken,
        pending_results,
        published_results,
        average_percentage: average_percentage(&scores),
        upcoming_exams,
    })
}

/// Headline counters for the caller's dashboard.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    tag = "dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Role-specific counters", body = DashboardStats))
)]
pub async fn stats(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let stats = match claims.role {
        Role::Teacher => DashboardStats::Teacher(teacher_stats(&pool, claims.user_id()?).await?),
        Role::Student => DashboardStats::Student(student_stats(&pool, &claims).await?),
    };
    Ok(Json(stats))
}

/// The most recent submission events visible to the caller.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/activity",
    tag = "dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Recent activity", body = [ActivityItem]))
)]
pub async fn activity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let scope = match claims.role {
        Role::Teacher => "e.created_by = $1",
        Role::Student => "s.student_id = $1",
    };

    let sql = format!(
        r#"
        SELECT
            s.id AS submission_id,
            s.exam_id,
            e.title AS exam_title,
            st.first_name || ' ' || st.last_name AS student_name,
            s.status,
            s.updated_at
        FROM submissions s
        JOIN exams e ON e.id = s.exam_id
        JOIN students st ON st.id = s.student_id
        WHERE {}
        ORDER BY s.updated_at DESC
        LIMIT $2
        "#,
        scope
    );

    let items = sqlx::query_as::<_, ActivityItem>(&sql)
        .bind(claims.user_id()?)
        .bind(ACTIVITY_LIMIT)
        .fetch_all(&pool)
        .await?;

    Ok(Json(items))
}

/// Outstanding work. Teachers get grading and publishing backlogs per exam,
/// students get open exams they have not started.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/todo",
    tag = "dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Role-specific to-do list", body = TodoList))
)]
pub async fn todo(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let list = match claims.role {
        Role::Teacher => {
            let rows = sqlx::query_as::<_, TeacherTodo>(
                r#"
                SELECT
                    e.id AS exam_id,
                    e.title AS exam_title,
                    COUNT(s.id) FILTER (WHERE s.status = 'submitted') AS awaiting_grading,
                    COUNT(s.id) FILTER (WHERE s.status = 'evaluated') AS awaiting_publish
                FROM exams e
                JOIN submissions s ON s.exam_id = e.id
                WHERE e.created_by = $1
                GROUP BY e.id, e.title
                HAVING COUNT(s.id) FILTER (WHERE s.status IN ('submitted', 'evaluated')) > 0
                ORDER BY e.end_time
                "#,
            )
            .bind(claims.user_id()?)
            .fetch_all(&pool)
            .await?;
            TodoList::Teacher(rows)
        }
        Role::Student => {
            let student = current_student(&pool, &claims).await?;
            let started: HashSet<i64> =
                sqlx::query_scalar::<_, i64>("SELECT exam_id FROM submissions WHERE student_id = $1")
                    .bind(student.id)
                    .fetch_all(&pool)
                    .await?
                    .into_iter()
                    .collect();

            let exams = open_exams_for(&pool, &student)
                .await?
                .into_iter()
                .filter(|exam| !started.contains(&exam.id))
                .collect();
            TodoList::Student(exams)
        }
    };
    Ok(Json(list))
}
