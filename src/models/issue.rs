// src/models/issue.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "issue_status", rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Resolved,
    Closed,
}

/// Represents the 'issues' table: a problem raised by a student or teacher.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// 'exam', 'technical', 'result' or 'other'.
    pub category: String,
    pub status: IssueStatus,
    pub raised_by_id: i64,
    pub raised_by_role: Role,
    pub exam_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Issue {
    pub fn is_raised_by(&self, id: i64, role: Role) -> bool {
        self.raised_by_id == id && self.raised_by_role == role
    }
}

/// Represents the 'issue_replies' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueReply {
    pub id: i64,
    pub issue_id: i64,
    pub author_id: i64,
    pub author_role: Role,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueThread {
    pub issue: Issue,
    pub replies: Vec<IssueReply>,
}

const CATEGORIES: [&str; 4] = ["exam", "technical", "result", "other"];

fn validate_category(category: &str) -> Result<(), validator::ValidationError> {
    if !CATEGORIES.contains(&category) {
        let mut err = validator::ValidationError::new("invalid_category");
        err.message = Some("Category must be one of: exam, technical, result, other.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters."))]
    pub description: String,
    #[validate(custom(function = validate_category))]
    pub category: String,
    pub exam_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 5000, message = "Reply must be 1-5000 characters."))]
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIssueStatusRequest {
    pub status: IssueStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IssueListParams {
    pub status: Option<IssueStatus>,
}
