// tests/router_tests.rs
//
// Drives the router in-process. The pool connects lazily and none of these
// requests reach a handler that queries it, so no database is needed.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use exam_portal::{
    config::Config, models::user::Role, routes::create_router, state::AppState,
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

const SECRET: &str = "router-test-secret";

fn app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/exam_portal_unused")
        .expect("lazy pool");

    let config = Config {
        database_url: "postgres://localhost/exam_portal_unused".to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        login_rate_limit: false,
    };

    create_router(AppState::new(pool, config))
}

fn token(role: Role) -> String {
    sign_jwt(1, "someone@example.com", role, SECRET, 600).expect("sign token")
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app().oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn unknown_path_is_404() {
    let response = app()
        .oneshot(get("/api/v1/does-not-exist", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_token_is_401() {
    let response = app()
        .oneshot(get("/api/v1/student/exams/active", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn garbage_token_is_401() {
    let response = app()
        .oneshot(get("/api/v1/dashboard/stats", Some("not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_other_secret_is_401() {
    let forged = sign_jwt(1, "x@example.com", Role::Teacher, "other-secret", 600).unwrap();
    let response = app()
        .oneshot(get("/api/v1/teacher/exams", Some(&forged)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn student_cannot_reach_teacher_routes() {
    let student = token(Role::Student);

    let response = app()
        .oneshot(get("/api/v1/teacher/exams", Some(&student)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app()
        .oneshot(send_json(
            "POST",
            "/api/v1/exam",
            Some(&student),
            json!({ "title": "Sneaky" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn teacher_cannot_start_an_exam() {
    let teacher = token(Role::Teacher);

    let response = app()
        .oneshot(send_json(
            "POST",
            "/api/v1/student/exams/1/start",
            Some(&teacher),
            json!({ "accessCode": "ABC123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn student_cannot_change_issue_status() {
    let student = token(Role::Student);

    let response = app()
        .oneshot(send_json(
            "PUT",
            "/api/v1/issues/1/status",
            Some(&student),
            json!({ "status": "closed" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_registration_reports_fields() {
    let response = app()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/register/student",
            None,
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "not-an-email",
                "password": "123",
                "rollNumber": "CS-01",
                "department": "CS",
                "year": 9,
                "semester": 1,
                "section": "A",
                "batch": "2024"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation failed");
    let fields = body["fields"].as_object().expect("fields object");
    assert!(fields.contains_key("email"));
    assert!(fields.contains_key("password"));
    assert!(fields.contains_key("year"));
    assert!(!fields.contains_key("section"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let response = app()
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/api/v1/teacher/exams/{exam_id}/publish-results"].is_object());
}

#[tokio::test]
async fn missing_body_field_is_a_json_400() {
    let response = app()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/register/student",
            None,
            json!({ "firstName": "Ada", "password": "password123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"));

    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["fields"]["lastName"].is_array());
}

#[tokio::test]
async fn unknown_login_role_is_a_json_400() {
    let response = app()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({ "email": "a@b.edu", "password": "password123", "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["fields"]["role"].is_array());
}

#[tokio::test]
async fn non_numeric_id_is_a_json_400() {
    let teacher = token(Role::Teacher);
    let response = app()
        .oneshot(get("/api/v1/issues/abc", Some(&teacher)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn student_cannot_change_own_class() {
    let student = token(Role::Student);
    let response = app()
        .oneshot(send_json(
            "PUT",
            "/api/v1/student/profile",
            Some(&student),
            json!({ "section": "B" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["fields"]["section"].is_array());
}
