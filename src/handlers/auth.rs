// src/handlers/auth.rs

use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    extract::Json,
    handlers::lookup::{current_student, current_teacher},
    models::user::{
        LoginRequest, LoginResponse, MeResponse, Profile, RegisterStudentRequest,
        RegisterTeacherRequest, Role, Student, Teacher,
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registers a new student.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the student (excluding password).
#[utoipa::path(
    post,
    path = "/api/v1/auth/register/student",
    tag = "auth",
    request_body = RegisterStudentRequest,
    responses(
        (status = 201, description = "Student registered", body = Student),
        (status = 400, description = "Validation failed or email/roll number taken")
    )
)]
pub async fn register_student(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let student = sqlx::query_as::<_, Student>(
        r#"
        INSERT INTO students
            (first_name, last_name, email, password, roll_number,
             department, year, semester, section, batch, phone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(normalize_email(&payload.email))
    .bind(hashed_password)
    .bind(payload.roll_number.trim())
    .bind(payload.department.trim())
    .bind(payload.year)
    .bind(payload.semester)
    .bind(payload.section.trim())
    .bind(payload.batch.trim())
    .bind(payload.phone)
    .fetch_one(&pool)
    .await?;

    tracing::info!(student_id = student.id, "Student registered");

    Ok((StatusCode::CREATED, Json(student)))
}

/// Registers a new teacher.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register/teacher",
    tag = "auth",
    request_body = RegisterTeacherRequest,
    responses(
        (status = 201, description = "Teacher registered", body = Teacher),
        (status = 400, description = "Validation failed or email taken")
    )
)]
pub async fn register_teacher(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterTeacherRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let teacher = sqlx::query_as::<_, Teacher>(
        r#"
        INSERT INTO teachers (first_name, last_name, email, password, department, designation, phone)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(normalize_email(&payload.email))
    .bind(hashed_password)
    .bind(payload.department.trim())
    .bind(payload.designation)
    .bind(payload.phone)
    .fetch_one(&pool)
    .await?;

    tracing::info!(teacher_id = teacher.id, "Teacher registered");

    Ok((StatusCode::CREATED, Json(teacher)))
}

/// Authenticates a student or teacher and returns a JWT token.
///
/// Unknown email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let (id, password_hash, profile) = match payload.role {
        Role::Student => {
            let student =
                sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = $1")
                    .bind(&email)
                    .fetch_optional(&pool)
                    .await?
                    .ok_or_else(invalid)?;
            (student.id, student.password.clone(), Profile::Student(student))
        }
        Role::Teacher => {
            let teacher =
                sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE email = $1")
                    .bind(&email)
                    .fetch_optional(&pool)
                    .await?
                    .ok_or_else(invalid)?;
            (teacher.id, teacher.password.clone(), Profile::Teacher(teacher))
        }
    };

    if !verify_password(&payload.password, &password_hash)? {
        tracing::warn!(role = payload.role.as_str(), "Failed login for {}", email);
        return Err(invalid());
    }

    let token = sign_jwt(
        id,
        &email,
        payload.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        role: payload.role,
        user: profile,
    }))
}

/// Returns the profile of the identity behind the token.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = match claims.role {
        Role::Student => Profile::Student(current_student(&pool, &claims).await?),
        Role::Teacher => Profile::Teacher(current_teacher(&pool, &claims).await?),
    };

    Ok(Json(MeResponse {
        role: claims.role,
        user,
    }))
}
