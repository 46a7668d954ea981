// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::{exam::PublicExam, submission::SubmissionStatus};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeacherStats {
    pub total_exams: i64,
    pub active_exams: i64,
    pub total_submissions: i64,
    pub pending_evaluations: i64,
    pub published_results: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub exams_taken: i64,
    pub pending_results: i64,
    pub published_results: i64,
    /// Mean of `awarded / max * 100` over published results.
    pub average_percentage: Option<f64>,
    pub upcoming_exams: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DashboardStats {
    Teacher(TeacherStats),
    Student(StudentStats),
}

/// A recent submission event.
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub submission_id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub student_name: String,
    pub status: SubmissionStatus,
    pub updated_at: DateTime<Utc>,
}

/// Per-exam work left for a teacher.
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeacherTodo {
    pub exam_id: i64,
    pub exam_title: String,
    pub awaiting_grading: i64,
    pub awaiting_publish: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum TodoList {
    Teacher(Vec<TeacherTodo>),
    Student(Vec<PublicExam>),
}

/// Average percentage over `(awarded, max)` pairs; exams worth zero are skipped.
pub fn average_percentage(results: &[(f64, i32)]) -> Option<f64> {
    let percentages: Vec<f64> = results
        .iter()
        .filter(|(_, max)| *max > 0)
        .map(|(awarded, max)| awarded / *max as f64 * 100.0)
        .collect();

    if percentages.is_empty() {
        return None;
    }
    Some(percentages.iter().sum::<f64>() / percentages.len() as f64)
}
