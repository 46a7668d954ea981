// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::{auth, dashboard, exam, health, issue, question, student, teacher},
    openapi::ApiDoc,
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Everything except `/health` and the API docs lives under `/api/v1`.
/// * Role-gated groups run `auth_middleware` first, then the role check.
/// * Registration and login are throttled per client IP when enabled.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let authenticated = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let mut credential_routes = Router::new()
        .route("/register/student", post(auth::register_student))
        .route("/register/teacher", post(auth::register_teacher))
        .route("/login", post(auth::login));

    if state.config.login_rate_limit {
        match GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .finish()
        {
            Some(governor_conf) => {
                credential_routes =
                    credential_routes.layer(GovernorLayer::new(Arc::new(governor_conf)));
            }
            None => tracing::warn!("Invalid rate limit settings, login throttling disabled"),
        }
    }

    let auth_routes = credential_routes.merge(
        Router::new()
            .route("/me", get(auth::me))
            .layer(authenticated.clone()),
    );

    let exam_routes = Router::new()
        .route("/", post(exam::create_exam))
        .route("/{exam_id}", get(exam::get_exam).delete(exam::delete_exam))
        .route("/{exam_id}/regenerate-code", post(exam::regenerate_code))
        .layer(middleware::from_fn(teacher_middleware))
        .layer(authenticated.clone());

    let question_routes = Router::new()
        .route("/", post(question::add_question))
        .route("/exam/{exam_id}", get(question::list_exam_questions))
        .route(
            "/{question_id}",
            put(question::update_question).delete(question::delete_question),
        )
        .layer(middleware::from_fn(teacher_middleware))
        .layer(authenticated.clone());

    let student_routes = Router::new()
        .route(
            "/profile",
            get(student::get_profile).put(student::update_profile),
        )
        .route("/exams/active", get(student::active_exams))
        .route("/exams/upcoming", get(student::upcoming_exams))
        .route("/exams/{exam_id}/start", post(student::start_exam))
        .route("/submissions", get(student::list_submissions))
        .route("/submissions/{submission_id}", get(student::get_submission))
        .route(
            "/submissions/{submission_id}/submit",
            put(student::submit_exam),
        )
        .route("/results", get(student::list_results))
        .route("/results/{submission_id}", get(student::get_result))
        .layer(middleware::from_fn(student_middleware))
        .layer(authenticated.clone());

    let teacher_routes = Router::new()
        .route(
            "/profile",
            get(teacher::get_profile).put(teacher::update_profile),
        )
        .route("/exams", get(teacher::list_exams))
        .route("/exams/{exam_id}", put(teacher::update_exam))
        .route(
            "/exams/{exam_id}/submissions",
            get(teacher::list_exam_submissions),
        )
        .route(
            "/exams/{exam_id}/publish-results",
            post(teacher::publish_results),
        )
        .route("/submissions/{submission_id}", get(teacher::get_submission))
        .route(
            "/submissions/{submission_id}/grade",
            put(teacher::grade_submission),
        )
        .layer(middleware::from_fn(teacher_middleware))
        .layer(authenticated.clone());

    // Any signed-in role; handlers branch on the caller's role.
    let issue_routes = Router::new()
        .route("/", post(issue::create_issue).get(issue::list_issues))
        .route("/{issue_id}", get(issue::get_issue))
        .route("/{issue_id}/reply", post(issue::reply_issue))
        .route("/{issue_id}/status", put(issue::update_issue_status))
        .layer(authenticated.clone());

    let dashboard_routes = Router::new()
        .route("/stats", get(dashboard::stats))
        .route("/activity", get(dashboard::activity))
        .route("/todo", get(dashboard::todo))
        .layer(authenticated);

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/exam", exam_routes)
        .nest("/question", question_routes)
        .nest("/student", student_routes)
        .nest("/teacher", teacher_routes)
        .nest("/issues", issue_routes)
        .nest("/dashboard", dashboard_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
