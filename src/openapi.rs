// src/openapi.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    handlers::{auth, dashboard, exam, health, issue, question, student, teacher},
    models::{
        exam::ExamStatus, issue::IssueStatus, question::McqOption, question::QuestionType,
        submission::Answer, submission::SubmissionStatus, user::Role,
    },
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Exam Portal API", version = "1.0.0"),
    paths(
        health::health,
        auth::register_student,
        auth::register_teacher,
        auth::login,
        auth::me,
        exam::create_exam,
        exam::get_exam,
        exam::delete_exam,
        exam::regenerate_code,
        question::add_question,
        question::list_exam_questions,
        question::update_question,
        question::delete_question,
        student::get_profile,
        student::update_profile,
        student::active_exams,
        student::upcoming_exams,
        student::start_exam,
        student::list_submissions,
        student::get_submission,
        student::submit_exam,
        student::list_results,
        student::get_result,
        teacher::get_profile,
        teacher::update_profile,
        teacher::list_exams,
        teacher::update_exam,
        teacher::list_exam_submissions,
        teacher::get_submission,
        teacher::grade_submission,
        teacher::publish_results,
        issue::create_issue,
        issue::list_issues,
        issue::get_issue,
        issue::reply_issue,
        issue::update_issue_status,
        dashboard::stats,
        dashboard::activity,
        dashboard::todo,
    ),
    components(schemas(
        Role,
        ExamStatus,
        QuestionType,
        McqOption,
        SubmissionStatus,
        Answer,
        IssueStatus,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "exam", description = "Exam authoring"),
        (name = "question", description = "Question authoring"),
        (name = "student", description = "Taking exams and viewing results"),
        (name = "teacher", description = "Grading and publishing"),
        (name = "issues", description = "Support tickets"),
        (name = "dashboard", description = "Role-specific summaries"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_versioned_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/v1/student/exams/{exam_id}/start"));
        assert!(doc.paths.paths.contains_key("/health"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
