// src/handlers/issue.rs

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
    extract::{Json, Path, Query},
    models::{
        issue::{
            CreateIssueRequest, Issue, IssueListParams, IssueReply, IssueThread, ReplyRequest,
            UpdateIssueStatusRequest,
        },
        user::Role,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Loads an issue the caller may see: teachers see all, students their own.
async fn visible_issue(pool: &PgPool, issue_id: i64, claims: &Claims) -> Result<Issue, AppError> {
    let issue = sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE id = $1")
        .bind(issue_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Issue not found".to_string()))?;

    if claims.role == Role::Student && !issue.is_raised_by(claims.user_id()?, Role::Student) {
        // Don't reveal other students' issues exist.
        return Err(AppError::NotFound("Issue not found".to_string()));
    }
    Ok(issue)
}

/// Raises a new issue.
#[utoipa::path(
    post,
    path = "/api/v1/issues",
    tag = "issues",
    security(("bearer" = [])),
    request_body = CreateIssueRequest,
    responses(
        (status = 201, description = "Issue created", body = Issue),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_issue(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateIssueRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let issue = sqlx::query_as::<_, Issue>(
        r#"
        INSERT INTO issues (title, description, category, raised_by_id, raised_by_role, exam_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(clean_html(&payload.title))
    .bind(clean_html(&payload.description))
    .bind(&payload.category)
    .bind(claims.user_id()?)
    .bind(claims.role)
    .bind(payload.exam_id)
    .fetch_one(&pool)
    .await?;

    tracing::info!(issue_id = issue.id, role = claims.role.as_str(), "Issue raised");

    Ok((StatusCode::CREATED, Json(issue)))
}

/// Lists issues. Students get their own, teachers get everything.
#[utoipa::path(
    get,
    path = "/api/v1/issues",
    tag = "issues",
    security(("bearer" = [])),
    params(IssueListParams),
    responses((status = 200, description = "Issues", body = [Issue]))
)]
pub async fn list_issues(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<IssueListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new("SELECT * FROM issues WHERE TRUE");

    if claims.role == Role::Student {
        query_builder
            .push(" AND raised_by_role = ")
            .push_bind(Role::Student)
            .push(" AND raised_by_id = ")
            .push_bind(claims.user_id()?);
    }

    if let Some(status) = params.status {
        query_builder.push(" AND status = ").push_bind(status);
    }

    query_builder.push(" ORDER BY created_at DESC");

    let issues: Vec<Issue> = query_builder.build_query_as().fetch_all(&pool).await?;

    Ok(Json(issues))
}

/// Returns an issue with its replies, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/issues/{issue_id}",
    tag = "issues",
    security(("bearer" = [])),
    params(("issue_id" = i64, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Issue thread", body = IssueThread),
        (status = 404, description = "Issue not found")
    )
)]
pub async fn get_issue(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(issue_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let issue = visible_issue(&pool, issue_id, &claims).await?;

    let replies = sqlx::query_as::<_, IssueReply>(
        "SELECT * FROM issue_replies WHERE issue_id = $1 ORDER BY created_at, id",
    )
    .bind(issue.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(IssueThread { issue, replies }))
}

/// Adds a reply. Teachers may reply anywhere, students on their own issues.
#[utoipa::path(
    post,
    path = "/api/v1/issues/{issue_id}/reply",
    tag = "issues",
    security(("bearer" = [])),
    params(("issue_id" = i64, Path, description = "Issue id")),
    request_body = ReplyRequest,
    responses(
        (status = 201, description = "Reply added", body = IssueReply),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Issue not found")
    )
)]
pub async fn reply_issue(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(issue_id): Path<i64>,
    Json(payload): Json<ReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let issue = visible_issue(&pool, issue_id, &claims).await?;

    let message = clean_html(&payload.message);
    if message.is_empty() {
        return Err(AppError::BadRequest("Reply is empty after sanitizing".to_string()));
    }

    let mut tx = pool.begin().await?;

    let reply = sqlx::query_as::<_, IssueReply>(
        r#"
        INSERT INTO issue_replies (issue_id, author_id, author_role, message)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(issue.id)
    .bind(claims.user_id()?)
    .bind(claims.role)
    .bind(message)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE issues SET updated_at = NOW() WHERE id = $1")
        .bind(issue.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// Changes an issue's status. Teachers only.
#[utoipa::path(
    put,
    path = "/api/v1/issues/{issue_id}/status",
    tag = "issues",
    security(("bearer" = [])),
    params(("issue_id" = i64, Path, description = "Issue id")),
    request_body = UpdateIssueStatusRequest,
    responses(
        (status = 200, description = "Updated issue", body = Issue),
        (status = 403, description = "Teachers only"),
        (status = 404, description = "Issue not found")
    )
)]
pub async fn update_issue_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(issue_id): Path<i64>,
    Json(payload): Json<UpdateIssueStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role != Role::Teacher {
        return Err(AppError::Forbidden(
            "Only teachers can change issue status".to_string(),
        ));
    }

    let issue = sqlx::query_as::<_, Issue>(
        "UPDATE issues SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(payload.status)
    .bind(issue_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Issue not found".to_string()))?;

    Ok(Json(issue))
}
