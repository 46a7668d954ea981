// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Which identity collection an account lives in.
/// Stored as the `user_role` Postgres enum and carried in JWT claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

/// Represents the 'students' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub roll_number: String,
    pub department: String,
    pub year: i32,
    pub semester: i32,
    pub section: String,
    pub batch: String,
    pub phone: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Represents the 'teachers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    #[serde(skip)]
    pub password: String,

    pub department: String,
    pub designation: Option<String>,
    pub phone: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Either kind of account, serialized as the bare profile.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Profile {
    Student(Student),
    Teacher(Teacher),
}

/// DTO for student self-registration.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudentRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters."))]
    pub last_name: String,
    #[validate(email(message = "Email address is not valid."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 30, message = "Roll number must be 1-30 characters."))]
    pub roll_number: String,
    #[validate(length(min = 1, max = 100, message = "Department is required."))]
    pub department: String,
    #[validate(range(min = 1, max = 6, message = "Year must be between 1 and 6."))]
    pub year: i32,
    #[validate(range(min = 1, max = 12, message = "Semester must be between 1 and 12."))]
    pub semester: i32,
    #[validate(length(min = 1, max = 10, message = "Section must be 1-10 characters."))]
    pub section: String,
    #[validate(length(min = 1, max = 20, message = "Batch must be 1-20 characters."))]
    pub batch: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

/// DTO for teacher registration.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTeacherRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters."))]
    pub last_name: String,
    #[validate(email(message = "Email address is not valid."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Department is required."))]
    pub department: String,
    #[validate(length(max = 100))]
    pub designation: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

/// DTO for login. The role picks the collection the email is looked up in.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub role: Role,
    pub user: Profile,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub role: Role,
    pub user: Profile,
}

/// DTO for a student editing their own profile. Absent fields are untouched.
///
/// Department, year, semester and section place the student in a class and
/// feed the exam access gate, so they are fixed at registration.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStudentProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub batch: Option<String>,
}

/// DTO for a teacher editing their own profile.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeacherProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 100))]
    pub designation: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}
