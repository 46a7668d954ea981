// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    config::DEFAULT_PASS_PERCENTAGE,
    models::{
        question::{CreateQuestionRequest, Question},
        user::Student,
    },
    utils::access_code::codes_match,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "exam_status", rename_all = "lowercase")]
pub enum ExamStatus {
    Draft,
    Scheduled,
    Active,
    Completed,
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,

    // Target class.
    pub department: String,
    pub year: i32,
    pub semester: i32,
    pub section: String,
    pub batch: Option<String>,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,

    /// Six uppercase alphanumerics, unique across exams.
    pub access_code: String,
    pub status: ExamStatus,

    /// Sum of question marks; recomputed whenever questions change.
    pub total_marks: i32,
    pub passing_marks: Option<i32>,

    /// When non-empty, only these roll numbers may start the exam.
    pub allowed_roll_numbers: Vec<String>,
    pub instructions: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why the access gate turned a student away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    InvalidCode,
    OutsideWindow,
    ClassMismatch,
    NotOnRollList,
}

impl AccessDenied {
    pub fn message(&self) -> &'static str {
        match self {
            AccessDenied::InvalidCode => "Invalid access code",
            AccessDenied::OutsideWindow => "Exam is not open at this time",
            AccessDenied::ClassMismatch => "This exam is not assigned to your class",
            AccessDenied::NotOnRollList => "Your roll number is not allowed for this exam",
        }
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl Exam {
    /// Access gate for starting the exam.
    ///
    /// Checks run in order and the first failure wins: access code
    /// (case-insensitive), time window `[start_time, end_time]`, target class
    /// (department, year, section), then the roll-number allow list when one
    /// is set.
    pub fn check_access(
        &self,
        student: &Student,
        provided_code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccessDenied> {
        if !codes_match(&self.access_code, provided_code) {
            return Err(AccessDenied::InvalidCode);
        }

        if !self.is_open_at(now) {
            return Err(AccessDenied::OutsideWindow);
        }

        if !self.targets(student) {
            return Err(AccessDenied::ClassMismatch);
        }

        if !self.admits_roll_number(&student.roll_number) {
            return Err(AccessDenied::NotOnRollList);
        }

        Ok(())
    }

    /// Boolean form of [`Exam::check_access`].
    pub fn can_access(&self, student: &Student, provided_code: &str, now: DateTime<Utc>) -> bool {
        self.check_access(student, provided_code, now).is_ok()
    }

    /// Whether the student belongs to the exam's target class.
    pub fn targets(&self, student: &Student) -> bool {
        same_text(&self.department, &student.department)
            && self.year == student.year
            && same_text(&self.section, &student.section)
    }

    /// An empty allow list admits everyone.
    pub fn admits_roll_number(&self, roll_number: &str) -> bool {
        self.allowed_roll_numbers.is_empty()
            || self
                .allowed_roll_numbers
                .iter()
                .any(|r| same_text(r, roll_number))
    }

    /// Both window bounds are inclusive.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now <= self.end_time
    }

    /// Marks needed to pass: the explicit threshold, else a percentage of the total.
    pub fn pass_threshold(&self) -> f64 {
        match self.passing_marks {
            Some(marks) => marks as f64,
            None => self.total_marks as f64 * DEFAULT_PASS_PERCENTAGE / 100.0,
        }
    }

    /// When an attempt started at `started_at` has to be handed in.
    pub fn deadline_for(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        let by_duration = started_at + chrono::Duration::minutes(self.duration_minutes as i64);
        by_duration.min(self.end_time)
    }
}

/// Exam as shown to students: everything except the access code and roll list.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicExam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub department: String,
    pub year: i32,
    pub semester: i32,
    pub section: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: ExamStatus,
    pub total_marks: i32,
    pub instructions: Option<String>,
}

impl From<Exam> for PublicExam {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            subject: exam.subject,
            department: exam.department,
            year: exam.year,
            semester: exam.semester,
            section: exam.section,
            start_time: exam.start_time,
            end_time: exam.end_time,
            duration_minutes: exam.duration_minutes,
            status: exam.status,
            total_marks: exam.total_marks,
            instructions: exam.instructions,
        }
    }
}

/// Exam with its full questions, for the owning teacher.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetail {
    pub exam: Exam,
    pub questions: Vec<Question>,
}

/// Teacher's exam listing row: the exam plus submission counts per status.
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub exam: Exam,
    pub question_count: i64,
    pub in_progress_count: i64,
    pub submitted_count: i64,
    pub evaluated_count: i64,
    pub published_count: i64,
}

/// DTO for creating an exam, optionally with its questions inline.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_create_window))]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Department is required."))]
    pub department: String,
    #[validate(range(min = 1, max = 6, message = "Year must be between 1 and 6."))]
    pub year: i32,
    #[validate(range(min = 1, max = 12, message = "Semester must be between 1 and 12."))]
    pub semester: i32,
    #[validate(length(min = 1, max = 10, message = "Section is required."))]
    pub section: String,
    #[validate(length(max = 20))]
    pub batch: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be 1-1440 minutes."))]
    pub duration_minutes: i32,
    /// Optional fixed code; generated when absent.
    pub access_code: Option<String>,
    pub status: Option<ExamStatus>,
    #[validate(range(min = 0))]
    pub passing_marks: Option<i32>,
    #[serde(default)]
    pub allowed_roll_numbers: Vec<String>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

fn validate_create_window(req: &CreateExamRequest) -> Result<(), ValidationError> {
    validate_window(req.start_time, req.end_time)
}

pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if end <= start {
        let mut err = ValidationError::new("invalid_window");
        err.message = Some("End time must be after start time.".into());
        return Err(err);
    }
    Ok(())
}

/// DTO for a partial exam update. Status is caller-driven: any value is accepted.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub department: Option<String>,
    #[validate(range(min = 1, max = 6))]
    pub year: Option<i32>,
    #[validate(range(min = 1, max = 12))]
    pub semester: Option<i32>,
    #[validate(length(min = 1, max = 10))]
    pub section: Option<String>,
    #[validate(length(max = 20))]
    pub batch: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,
    pub status: Option<ExamStatus>,
    #[validate(range(min = 0))]
    pub passing_marks: Option<i32>,
    pub allowed_roll_numbers: Option<Vec<String>>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn exam() -> Exam {
        Exam {
            id: 7,
            title: "Operating Systems Mid-Term".into(),
            description: None,
            subject: Some("OS".into()),
            department: "CSE".into(),
            year: 3,
            semester: 5,
            section: "A".into(),
            batch: Some("2022".into()),
            start_time: t0(),
            end_time: t0() + Duration::minutes(60),
            duration_minutes: 45,
            access_code: "ABC123".into(),
            status: ExamStatus::Active,
            total_marks: 20,
            passing_marks: None,
            allowed_roll_numbers: vec![],
            instructions: None,
            created_by: 1,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    fn student() -> Student {
        Student {
            id: 11,
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha@college.edu".into(),
            password: String::new(),
            roll_number: "CS22-001".into(),
            department: "cse".into(),
            year: 3,
            semester: 5,
            section: "a".into(),
            batch: "2022".into(),
            phone: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[test]
    fn lowercase_code_inside_window_is_accepted() {
        let now = t0() + Duration::minutes(10);
        assert_eq!(exam().check_access(&student(), "abc123", now), Ok(()));
        assert!(exam().can_access(&student(), "abc123", now));
    }

    #[test]
    fn wrong_code_alone_is_rejected() {
        let now = t0() + Duration::minutes(10);
        assert_eq!(
            exam().check_access(&student(), "XYZ999", now),
            Err(AccessDenied::InvalidCode)
        );
    }

    #[test]
    fn outside_window_alone_is_rejected() {
        let before = t0() - Duration::seconds(1);
        let after = t0() + Duration::minutes(61);
        assert_eq!(
            exam().check_access(&student(), "ABC123", before),
            Err(AccessDenied::OutsideWindow)
        );
        assert_eq!(
            exam().check_access(&student(), "ABC123", after),
            Err(AccessDenied::OutsideWindow)
        );
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let e = exam();
        assert!(e.can_access(&student(), "ABC123", e.start_time));
        assert!(e.can_access(&student(), "ABC123", e.end_time));
    }

    #[test]
    fn class_mismatch_alone_is_rejected() {
        let now = t0() + Duration::minutes(10);
        let mut other_section = student();
        other_section.section = "B".into();
        let mut other_dept = student();
        other_dept.department = "ECE".into();
        let mut other_year = student();
        other_year.year = 2;

        for s in [other_section, other_dept, other_year] {
            assert_eq!(
                exam().check_access(&s, "ABC123", now),
                Err(AccessDenied::ClassMismatch)
            );
        }
    }

    #[test]
    fn code_is_checked_before_window() {
        let late = t0() + Duration::hours(5);
        assert_eq!(
            exam().check_access(&student(), "nope00", late),
            Err(AccessDenied::InvalidCode)
        );
    }

    #[test]
    fn roll_list_applies_only_when_set() {
        let now = t0() + Duration::minutes(10);
        let mut e = exam();
        e.allowed_roll_numbers = vec!["CS22-002".into()];
        assert_eq!(
            e.check_access(&student(), "ABC123", now),
            Err(AccessDenied::NotOnRollList)
        );
        e.allowed_roll_numbers.push("cs22-001".into());
        assert!(e.can_access(&student(), "ABC123", now));
    }

    #[test]
    fn deadline_is_capped_by_end_time() {
        let e = exam();
        assert_eq!(
            e.deadline_for(t0() + Duration::minutes(5)),
            t0() + Duration::minutes(50)
        );
        assert_eq!(e.deadline_for(t0() + Duration::minutes(30)), e.end_time);
    }

    #[test]
    fn pass_threshold_falls_back_to_percentage() {
        let mut e = exam();
        assert_eq!(e.pass_threshold(), 8.0);
        e.passing_marks = Some(12);
        assert_eq!(e.pass_threshold(), 12.0);
    }

    #[test]
    fn window_validation_rejects_reversed_times() {
        assert!(validate_window(t0(), t0()).is_err());
        assert!(validate_window(t0(), t0() + Duration::minutes(1)).is_ok());
    }
}
